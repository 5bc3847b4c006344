//! # Local Cache Module
//!
//! On-disk cache for streamed audio, keyed by streaming track id.
//!
//! ## Overview
//!
//! Once a streamed track has been downloaded, later play requests for the
//! same id are served from disk without touching the network. Key features:
//! - Storage through the `FileSystemAccess` bridge
//! - Downloads through the `HttpClient` bridge, streamed to disk
//! - LRU eviction with a configurable size limit
//! - A JSON manifest so the index survives restarts
//! - Progress reporting for downloads
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     LocalCache                         │
//! │  - download()                          │
//! │  - cached_path()                       │
//! │  - evict() / clear()                   │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> manifest.json (index)
//!          ├──> FileSystemAccess (Storage)
//!          └──> HttpClient (Downloads)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::{CacheConfig, LocalCache};
//!
//! let cache = LocalCache::new(CacheConfig::new(cache_dir), fs, http);
//! cache.initialize().await?;
//!
//! if let Some(path) = cache.cached_path("XYZ").await {
//!     // play from disk
//! }
//! ```

pub mod config;
pub mod manager;
pub mod stats;

// Re-export commonly used types
pub use config::CacheConfig;
pub use manager::{DownloadOutcome, LocalCache, ProgressCallback};
pub use stats::{CacheEntry, CacheStats, DownloadProgress};
