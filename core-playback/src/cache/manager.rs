//! # Local Cache Manager
//!
//! Content-addressed on-disk cache for streamed audio.
//!
//! This module provides:
//! - A JSON manifest (`manifest.json`) describing every stored file
//! - Streaming downloads written to `<hash>.part` and renamed to
//!   `<hash>.audio` once complete, so readers never see partial files
//! - At most one download per track id at a time
//! - Least-recently-used eviction once the size limit is exceeded
//! - Retry with exponential backoff and progress reporting

use crate::cache::{
    config::CacheConfig,
    stats::{CacheEntry, CacheStats, DownloadProgress},
};
use crate::error::{PlaybackError, Result};
use bridge_traits::{
    http::{HttpClient, HttpRequest},
    storage::FileSystemAccess,
    time::{Clock, SystemClock},
};
use bytes::Bytes;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use core_runtime::logging::{redact_url, strip_path};
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};

const CHUNK_SIZE: usize = 64 * 1024;
const AUDIO_EXTENSION: &str = "audio";
const PARTIAL_EXTENSION: &str = "part";

/// Callback invoked with download progress.
pub type ProgressCallback = Arc<dyn Fn(&DownloadProgress) + Send + Sync>;

/// Result of a download request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The file was downloaded by this call.
    Downloaded(CacheEntry),
    /// The track was already cached; nothing was fetched.
    AlreadyCached(CacheEntry),
    /// Another download of the same track is running.
    InProgress,
}

/// Marks a track id as downloading for as long as it lives.
struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    track_id: String,
}

impl InFlightGuard {
    fn acquire(in_flight: &Arc<Mutex<HashSet<String>>>, track_id: &str) -> Option<Self> {
        if !in_flight.lock().insert(track_id.to_string()) {
            return None;
        }

        Some(Self {
            in_flight: Arc::clone(in_flight),
            track_id: track_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.track_id);
    }
}

/// On-disk cache for streamed tracks.
pub struct LocalCache {
    config: CacheConfig,
    fs: Arc<dyn FileSystemAccess>,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    /// Ordered from least to most recently used.
    index: Mutex<LruCache<String, CacheEntry>>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    initialized: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LocalCache {
    /// Create a new cache. Call [`initialize`](Self::initialize) before use.
    pub fn new(
        config: CacheConfig,
        fs: Arc<dyn FileSystemAccess>,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            config,
            fs,
            http_client,
            clock: Arc::new(SystemClock),
            event_bus: None,
            index: Mutex::new(LruCache::unbounded()),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            initialized: AtomicBool::new(false),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Set event bus for download and eviction events.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Replace the clock used for manifest timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Cache(event)).ok();
        }
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(PlaybackError::CacheError("Cache not initialized".to_string()))
        }
    }

    /// Create the cache directory and load the manifest.
    ///
    /// Entries whose file is gone and leftover partial downloads are dropped.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        self.config.validate().map_err(|e| {
            PlaybackError::CacheError(format!("Invalid cache configuration: {}", e))
        })?;

        let dir = &self.config.cache_dir;
        self.fs.create_dir_all(dir).await.map_err(|e| {
            error!(error = %e, "Failed to create cache directory");
            PlaybackError::CacheError(format!("Failed to create cache directory: {}", e))
        })?;

        let mut entries = self.read_manifest().await;
        let before = entries.len();

        let mut kept = Vec::with_capacity(entries.len());
        for entry in entries.drain(..) {
            let path = dir.join(&entry.file_name);
            if self.fs.exists(&path).await.unwrap_or(false) {
                kept.push(entry);
            }
        }

        self.remove_partial_files().await;

        kept.sort_by_key(|e| e.last_accessed_at);
        {
            let mut index = self.index.lock();
            index.clear();
            for entry in kept {
                index.put(entry.track_id.clone(), entry);
            }
        }
        self.initialized.store(true, Ordering::Release);

        let stale = before - self.index.lock().len();
        if stale > 0 {
            self.write_manifest().await?;
        }

        info!(
            entries = self.index.lock().len(),
            stale,
            dir = %strip_path(&dir.to_string_lossy()),
            "Local cache initialized"
        );
        Ok(())
    }

    async fn read_manifest(&self) -> Vec<CacheEntry> {
        let path = self.config.manifest_path();
        if !self.fs.exists(&path).await.unwrap_or(false) {
            return Vec::new();
        }

        let data = match self.fs.read_file(&path).await {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "Failed to read cache manifest, starting empty");
                return Vec::new();
            }
        };

        serde_json::from_slice(&data).unwrap_or_else(|e| {
            warn!(error = %e, "Corrupt cache manifest, starting empty");
            Vec::new()
        })
    }

    async fn write_manifest(&self) -> Result<()> {
        let entries: Vec<CacheEntry> = self.index.lock().iter().map(|(_, e)| e.clone()).collect();
        let data = serde_json::to_vec(&entries)
            .map_err(|e| PlaybackError::CacheError(format!("Failed to encode manifest: {}", e)))?;

        self.fs
            .write_file(&self.config.manifest_path(), Bytes::from(data))
            .await
            .map_err(|e| PlaybackError::CacheError(format!("Failed to write manifest: {}", e)))
    }

    async fn remove_partial_files(&self) {
        let Ok(files) = self.fs.list_directory(&self.config.cache_dir).await else {
            return;
        };

        for file in files {
            if file.extension() == Some(OsStr::new(PARTIAL_EXTENSION)) {
                if let Err(e) = self.fs.delete_file(&file).await {
                    warn!(error = %e, "Failed to remove partial download");
                }
            }
        }
    }

    /// File name stem for a track id.
    fn content_key(track_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(track_id.as_bytes());
        hex::encode(hasher.finalize())
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Whether a complete download for `track_id` is indexed.
    pub fn is_cached(&self, track_id: &str) -> bool {
        self.index.lock().contains(track_id)
    }

    /// Whether a download for `track_id` is running.
    pub fn is_downloading(&self, track_id: &str) -> bool {
        self.in_flight.lock().contains(track_id)
    }

    /// Path of the cached file for `track_id`, counting a hit or a miss.
    ///
    /// A hit refreshes the entry's recency. Entries whose file disappeared
    /// are dropped and reported as a miss.
    pub async fn cached_path(&self, track_id: &str) -> Option<PathBuf> {
        let now = self.clock.unix_timestamp_millis();
        let file_name = {
            let mut index = self.index.lock();
            index.get_mut(track_id).map(|entry| {
                entry.last_accessed_at = now;
                entry.file_name.clone()
            })
        };

        let Some(file_name) = file_name else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let path = self.config.cache_dir.join(file_name);
        if !self.fs.exists(&path).await.unwrap_or(false) {
            warn!(track_id, "Cached file missing, dropping entry");
            self.index.lock().pop(track_id);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(path)
    }

    pub fn entry(&self, track_id: &str) -> Option<CacheEntry> {
        self.index.lock().peek(track_id).cloned()
    }

    // ========================================================================
    // Downloads
    // ========================================================================

    /// Download `url` into the cache under `track_id`.
    ///
    /// Returns [`DownloadOutcome::InProgress`] without doing anything when the
    /// same track is already downloading.
    #[instrument(skip(self, url, progress))]
    pub async fn download(
        &self,
        track_id: &str,
        url: &str,
        progress: Option<ProgressCallback>,
    ) -> Result<DownloadOutcome> {
        self.ensure_initialized()?;

        if let Some(entry) = self.entry(track_id) {
            debug!("Track already cached");
            return Ok(DownloadOutcome::AlreadyCached(entry));
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, track_id) else {
            debug!("Download already in progress");
            return Ok(DownloadOutcome::InProgress);
        };

        info!(url = %redact_url(url), "Starting cache download");
        self.emit(CacheEvent::DownloadStarted {
            track_id: track_id.to_string(),
        });

        match self.download_with_retry(track_id, url, progress.as_ref()).await {
            Ok(entry) => {
                self.index.lock().put(track_id.to_string(), entry.clone());
                self.emit(CacheEvent::DownloadCompleted {
                    track_id: track_id.to_string(),
                    size_bytes: entry.size_bytes,
                });

                self.enforce_size_limit(track_id).await;
                if let Err(e) = self.write_manifest().await {
                    warn!(error = %e, "Failed to persist cache manifest");
                }

                Ok(DownloadOutcome::Downloaded(entry))
            }
            Err(e) => {
                error!(error = %e, "Cache download failed");
                self.emit(CacheEvent::DownloadFailed {
                    track_id: track_id.to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Download with automatic retry logic.
    async fn download_with_retry(
        &self,
        track_id: &str,
        url: &str,
        progress: Option<&ProgressCallback>,
    ) -> Result<CacheEntry> {
        let attempts = self.config.max_retry_attempts;
        let mut last_error = None;

        for attempt in 1..=attempts {
            debug!(attempt, max_attempts = attempts, "Download attempt");

            match timeout(
                self.config.download_timeout,
                self.download_once(track_id, url, progress),
            )
            .await
            {
                Ok(Ok(entry)) => return Ok(entry),
                Ok(Err(e)) => {
                    warn!(attempt, error = %e, "Download attempt failed");
                    last_error = Some(e);
                }
                Err(_) => {
                    warn!(attempt, "Download attempt timed out");
                    last_error = Some(PlaybackError::CacheError("Download timeout".to_string()));
                }
            }

            self.discard_partial(track_id).await;

            // Wait before retry (exponential backoff)
            if attempt < attempts {
                let delay = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            PlaybackError::CacheError("Download failed after all retries".to_string())
        }))
    }

    async fn download_once(
        &self,
        track_id: &str,
        url: &str,
        progress: Option<&ProgressCallback>,
    ) -> Result<CacheEntry> {
        let key = Self::content_key(track_id);
        let partial_path = self
            .config
            .cache_dir
            .join(format!("{}.{}", key, PARTIAL_EXTENSION));
        let file_name = format!("{}.{}", key, AUDIO_EXTENSION);
        let final_path = self.config.cache_dir.join(&file_name);

        let mut stream = self
            .http_client
            .download_stream(HttpRequest::get(url))
            .await
            .map_err(|e| PlaybackError::CacheError(format!("Download failed: {}", e)))?;

        let mut writer = self.fs.open_write_stream(&partial_path).await?;
        let mut tracker = DownloadProgress::new(
            track_id.to_string(),
            stream.content_length,
            self.clock.unix_timestamp_millis(),
        );

        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut downloaded = 0u64;
        let mut next_report = self.config.progress_interval_bytes;

        loop {
            let read = stream.reader.read(&mut buffer).await?;
            if read == 0 {
                break;
            }

            writer.write_all(&buffer[..read]).await?;
            downloaded += read as u64;

            if downloaded >= next_report {
                next_report = downloaded + self.config.progress_interval_bytes;
                self.report_progress(&mut tracker, downloaded, progress);
            }
        }

        writer.flush().await?;
        writer.shutdown().await?;
        drop(writer);

        if downloaded == 0 {
            return Err(PlaybackError::CacheError("Empty download".to_string()));
        }

        if let Some(expected) = stream.content_length {
            if expected != downloaded {
                return Err(PlaybackError::CacheError(format!(
                    "Truncated download: expected {} bytes, got {}",
                    expected, downloaded
                )));
            }
        }

        self.report_progress(&mut tracker, downloaded, progress);
        self.fs.rename(&partial_path, &final_path).await?;

        info!(
            size_bytes = downloaded,
            speed = %tracker.speed_string(),
            "Track cached"
        );

        let now = self.clock.unix_timestamp_millis();
        Ok(CacheEntry {
            track_id: track_id.to_string(),
            file_name,
            size_bytes: downloaded,
            created_at: now,
            last_accessed_at: now,
        })
    }

    fn report_progress(
        &self,
        tracker: &mut DownloadProgress,
        downloaded: u64,
        progress: Option<&ProgressCallback>,
    ) {
        tracker.update(downloaded, self.clock.unix_timestamp_millis());

        if let Some(callback) = progress {
            (callback.as_ref())(tracker);
        }

        self.emit(CacheEvent::DownloadProgress {
            track_id: tracker.track_id.clone(),
            bytes_downloaded: downloaded,
            total_bytes: tracker.total_bytes,
        });
    }

    async fn discard_partial(&self, track_id: &str) {
        let path = self.config.cache_dir.join(format!(
            "{}.{}",
            Self::content_key(track_id),
            PARTIAL_EXTENSION
        ));

        if self.fs.exists(&path).await.unwrap_or(false) {
            if let Err(e) = self.fs.delete_file(&path).await {
                warn!(error = %e, "Failed to remove partial download");
            }
        }
    }

    // ========================================================================
    // Eviction
    // ========================================================================

    /// Evict least recently used entries until the cache fits its limit.
    ///
    /// `keep` is never evicted.
    async fn enforce_size_limit(&self, keep: &str) -> usize {
        let max = self.config.max_cache_size_bytes;
        let mut evicted = Vec::new();

        {
            let mut index = self.index.lock();
            let mut total: u64 = index.iter().map(|(_, e)| e.size_bytes).sum();

            while total > max {
                let Some((id, entry)) = index.pop_lru() else {
                    break;
                };

                if id == keep {
                    // Only the newest entry is left; it stays even if oversized.
                    index.put(id, entry);
                    if index.len() == 1 {
                        break;
                    }
                    continue;
                }

                total -= entry.size_bytes;
                evicted.push(entry);
            }
        }

        for entry in &evicted {
            self.delete_entry_file(entry).await;
            debug!(track_id = %entry.track_id, size_bytes = entry.size_bytes, "Evicted");
        }

        if !evicted.is_empty() {
            info!(count = evicted.len(), "Evicted cache entries over size limit");
        }
        evicted.len()
    }

    async fn delete_entry_file(&self, entry: &CacheEntry) {
        let path = self.config.cache_dir.join(&entry.file_name);
        if let Err(e) = self.fs.delete_file(&path).await {
            // The entry is gone from the index either way
            warn!(error = %e, track_id = %entry.track_id, "Failed to delete cache file");
        }

        self.emit(CacheEvent::Evicted {
            track_id: entry.track_id.clone(),
            size_bytes: entry.size_bytes,
        });
    }

    /// Remove a track from the cache. Returns `false` if it was not cached.
    #[instrument(skip(self))]
    pub async fn evict(&self, track_id: &str) -> Result<bool> {
        self.ensure_initialized()?;

        let Some(entry) = self.index.lock().pop(track_id) else {
            return Ok(false);
        };

        self.delete_entry_file(&entry).await;
        self.write_manifest().await?;
        Ok(true)
    }

    /// Remove every cached track. Returns the number removed.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<usize> {
        self.ensure_initialized()?;

        let entries: Vec<CacheEntry> = {
            let mut index = self.index.lock();
            let entries = index.iter().map(|(_, e)| e.clone()).collect();
            index.clear();
            entries
        };

        for entry in &entries {
            let path = self.config.cache_dir.join(&entry.file_name);
            if let Err(e) = self.fs.delete_file(&path).await {
                warn!(error = %e, "Failed to delete cache file");
            }
        }

        self.write_manifest().await?;
        self.emit(CacheEvent::Cleared {
            entries_removed: entries.len(),
        });

        info!(count = entries.len(), "Cache cleared");
        Ok(entries.len())
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let (entries, total_bytes) = {
            let index = self.index.lock();
            (index.len(), index.iter().map(|(_, e)| e.size_bytes).sum())
        };

        CacheStats {
            entries,
            total_bytes,
            max_bytes: self.config.max_cache_size_bytes,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            downloads_in_progress: self.in_flight.lock().len(),
        }
    }
}
