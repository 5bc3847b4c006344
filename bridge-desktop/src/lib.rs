//! Desktop and test implementations of the host bridges: [`ReqwestHttpClient`]
//! for cache downloads and [`TokioFileSystem`] for cache files.
//!
//! There is no desktop `MediaPlayer`; hosts always bring their own.
//!
//! ```ignore
//! let config = CoreConfig::builder()
//!     .cache_dir("/tmp/player-core")
//!     .http_client(Arc::new(ReqwestHttpClient::new()))
//!     .file_system(Arc::new(TokioFileSystem::new()))
//!     .media_player(my_player)
//!     .build()?;
//! ```

mod filesystem;
mod http;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
