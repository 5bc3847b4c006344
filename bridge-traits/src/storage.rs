//! File I/O used by the audio cache.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Host file access for the audio cache.
///
/// On mobile every path handed in lives under the app-private cache
/// directory the host configured, so implementations never need to
/// choose a location themselves.
///
/// ```ignore
/// async fn commit(fs: &dyn FileSystemAccess, partial: &Path, done: &Path) -> Result<()> {
///     if fs.exists(done).await? {
///         fs.delete_file(done).await?;
///     }
///     fs.rename(partial, done).await
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Create `path` and any missing parents.
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Write `data`, replacing the file if it exists. Missing parents are
    /// created.
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// # Errors
    ///
    /// [`BridgeError::NotFound`](crate::BridgeError::NotFound) when the file
    /// does not exist.
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Atomically move `from` to `to`, replacing `to` if it exists.
    ///
    /// Both paths must live on the same volume.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Entries directly inside `path`, in no particular order.
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Open `path` for streaming writes, truncating any existing content.
    async fn open_write_stream(
        &self,
        path: &Path,
    ) -> Result<Box<dyn tokio::io::AsyncWrite + Send + Unpin>>;
}
