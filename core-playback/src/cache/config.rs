//! Cache configuration

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the local audio cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory holding cached audio and the manifest
    pub cache_dir: PathBuf,

    /// Maximum cache size in bytes (default: 1GB)
    pub max_cache_size_bytes: u64,

    /// Download timeout for one attempt (default: 300s)
    pub download_timeout: Duration,

    /// Attempts per download, including the first (default: 3)
    pub max_retry_attempts: u32,

    /// Emit a progress event every this many bytes (default: 256KB)
    pub progress_interval_bytes: u64,
}

impl CacheConfig {
    /// Create a configuration for `cache_dir` with default limits.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            max_cache_size_bytes: 1024 * 1024 * 1024,
            download_timeout: Duration::from_secs(300),
            max_retry_attempts: 3,
            progress_interval_bytes: 256 * 1024,
        }
    }

    /// Set maximum cache size.
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_cache_size_bytes = bytes;
        self
    }

    /// Set download timeout.
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Set the number of attempts per download.
    pub fn with_max_retry_attempts(mut self, attempts: u32) -> Self {
        self.max_retry_attempts = attempts;
        self
    }

    pub fn with_progress_interval(mut self, bytes: u64) -> Self {
        self.progress_interval_bytes = bytes;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err("cache_dir cannot be empty".to_string());
        }

        if self.max_cache_size_bytes == 0 {
            return Err("max_cache_size_bytes must be greater than 0".to_string());
        }

        if self.max_retry_attempts == 0 {
            return Err("max_retry_attempts must be at least 1".to_string());
        }

        Ok(())
    }

    pub(crate) fn manifest_path(&self) -> PathBuf {
        self.cache_dir.join("manifest.json")
    }
}
