//! Cache entries, statistics and download progress

use serde::{Deserialize, Serialize};

/// A streamed track stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Streaming track id
    pub track_id: String,

    /// File name inside the cache directory
    pub file_name: String,

    pub size_bytes: u64,

    /// Unix millis
    pub created_at: i64,

    /// Unix millis of the last cache hit
    pub last_accessed_at: i64,
}

/// Statistics about the local cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
    pub max_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub downloads_in_progress: usize,
}

impl CacheStats {
    /// Cache usage as a percentage of the size limit.
    pub fn usage_percentage(&self) -> f64 {
        if self.max_bytes == 0 {
            return 0.0;
        }

        (self.total_bytes as f64 / self.max_bytes as f64) * 100.0
    }

    /// Returns true if the cache is near capacity (>90%).
    pub fn is_near_capacity(&self) -> bool {
        self.usage_percentage() > 90.0
    }

    /// Hit ratio in percent, `0.0` before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            return 0.0;
        }

        (self.hits as f64 / lookups as f64) * 100.0
    }
}

/// Download progress for one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub track_id: String,

    /// Total size, when the server announced one
    pub total_bytes: Option<u64>,

    pub downloaded_bytes: u64,

    /// Current download speed in bytes/second
    pub speed_bytes_per_sec: u64,

    /// Unix millis
    pub started_at: i64,

    /// Unix millis
    pub updated_at: i64,
}

impl DownloadProgress {
    pub fn new(track_id: String, total_bytes: Option<u64>, now_millis: i64) -> Self {
        Self {
            track_id,
            total_bytes,
            downloaded_bytes: 0,
            speed_bytes_per_sec: 0,
            started_at: now_millis,
            updated_at: now_millis,
        }
    }

    /// Update progress with new downloaded bytes.
    pub fn update(&mut self, downloaded_bytes: u64, now_millis: i64) {
        self.downloaded_bytes = downloaded_bytes;
        self.updated_at = now_millis;

        let elapsed_ms = (now_millis - self.started_at).max(1) as u64;
        self.speed_bytes_per_sec = downloaded_bytes.saturating_mul(1000) / elapsed_ms;
    }

    /// Progress percentage (0-100), when the total is known.
    pub fn percent(&self) -> Option<u8> {
        self.total_bytes.filter(|&t| t > 0).map(|total| {
            let percent = (self.downloaded_bytes as f64 / total as f64) * 100.0;
            percent.min(100.0) as u8
        })
    }

    /// Format speed as human-readable string.
    pub fn speed_string(&self) -> String {
        format_bytes_per_sec(self.speed_bytes_per_sec)
    }
}

/// Format bytes per second as human-readable string.
fn format_bytes_per_sec(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B/s", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB/s", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB/s", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB/s", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
