//! # Core Configuration Module
//!
//! Provides configuration management for the playback core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all bridges and tunables the core needs. It enforces
//! fail-fast validation so a missing bridge is reported at startup instead of
//! on the first play request.
//!
//! ## Required Dependencies
//!
//! - `MediaPlayer` - The host's native player adapter
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `HttpClient` - Cache downloads (desktop default: reqwest)
//! - `FileSystemAccess` - Cache storage (desktop default: tokio fs)
//!
//! When the `desktop-shims` feature is enabled, the desktop defaults are
//! injected automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, PlaybackTuning};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .cache_dir("/data/user/0/app/cache/audio")
//!     .cache_size_mb(512)
//!     .media_player(Arc::new(ExoPlayerAdapter::new()))
//!     .http_client(Arc::new(OkHttpBridge::new()))
//!     .file_system(Arc::new(AndroidFileSystem::new()))
//!     .tuning(PlaybackTuning::default().with_error_retry_delay(Duration::from_secs(2)))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // No MediaPlayer: fails with an actionable CapabilityMissing error
//! let config = CoreConfig::builder()
//!     .cache_dir("/tmp/player-core")
//!     .build()
//!     .expect("Should fail - missing required bridges");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{FileSystemAccess, HttpClient, MediaPlayer};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Core configuration for the playback core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Directory for downloaded audio
    pub cache_dir: PathBuf,

    /// Maximum cache size in megabytes
    pub cache_size_mb: usize,

    /// HTTP client for cache downloads
    pub http_client: Arc<dyn HttpClient>,

    /// File system access for the cache
    pub file_system: Arc<dyn FileSystemAccess>,

    /// Native media player adapter (required)
    pub media_player: Arc<dyn MediaPlayer>,

    /// Timing and range parameters for the engines
    pub tuning: PlaybackTuning,

    /// Feature flags
    pub features: FeatureFlags,

    /// Buffer size of the shared event bus
    pub event_buffer_size: usize,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("cache_dir", &self.cache_dir)
            .field("cache_size_mb", &self.cache_size_mb)
            .field("tuning", &self.tuning)
            .field("features", &self.features)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish_non_exhaustive()
    }
}

/// Feature flags for optional functionality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Download streamed tracks into the local cache in the background
    pub enable_stream_cache: bool,

    /// Restore the last queue and position when the service starts
    pub restore_session: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_stream_cache: true,
            restore_session: true,
        }
    }
}

/// Timing and range parameters shared by the playback engines.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackTuning {
    /// Interval between position polls while playing
    pub position_poll_interval: Duration,

    /// Pause before skipping past a track that failed
    pub error_retry_delay: Duration,

    /// "Previous" restarts the current track when the position is past this
    pub previous_restart_threshold: Duration,

    /// Delay before a streamed track is resolved again for caching, so the
    /// download does not compete with the player's own first request
    pub cache_warmup_delay: Duration,

    /// Quiet period before a search request is sent
    pub search_debounce: Duration,

    /// Upper bound on a single stream URL lookup
    pub resolve_timeout: Duration,

    /// How long a resolved stream URL is reused
    pub resolved_url_ttl: Duration,

    /// Smallest accepted playback speed
    pub min_speed: f32,

    /// Largest accepted playback speed
    pub max_speed: f32,
}

impl Default for PlaybackTuning {
    fn default() -> Self {
        Self {
            position_poll_interval: Duration::from_millis(100),
            error_retry_delay: Duration::from_secs(1),
            previous_restart_threshold: Duration::from_secs(3),
            cache_warmup_delay: Duration::from_secs(3),
            search_debounce: Duration::from_millis(300),
            resolve_timeout: Duration::from_secs(15),
            resolved_url_ttl: Duration::from_secs(30 * 60),
            min_speed: 0.25,
            max_speed: 3.0,
        }
    }
}

impl PlaybackTuning {
    pub fn with_position_poll_interval(mut self, interval: Duration) -> Self {
        self.position_poll_interval = interval;
        self
    }

    pub fn with_error_retry_delay(mut self, delay: Duration) -> Self {
        self.error_retry_delay = delay;
        self
    }

    pub fn with_previous_restart_threshold(mut self, threshold: Duration) -> Self {
        self.previous_restart_threshold = threshold;
        self
    }

    pub fn with_cache_warmup_delay(mut self, delay: Duration) -> Self {
        self.cache_warmup_delay = delay;
        self
    }

    pub fn with_search_debounce(mut self, debounce: Duration) -> Self {
        self.search_debounce = debounce;
        self
    }

    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    pub fn with_resolved_url_ttl(mut self, ttl: Duration) -> Self {
        self.resolved_url_ttl = ttl;
        self
    }

    pub fn with_speed_range(mut self, min: f32, max: f32) -> Self {
        self.min_speed = min;
        self.max_speed = max;
        self
    }

    /// Whether `speed` is inside the accepted range.
    pub fn accepts_speed(&self, speed: f32) -> bool {
        speed.is_finite() && speed >= self.min_speed && speed <= self.max_speed
    }

    /// Validates the tuning values.
    pub fn validate(&self) -> Result<()> {
        if self.position_poll_interval.is_zero() {
            return Err(Error::Config(
                "Position poll interval must be greater than zero".to_string(),
            ));
        }

        if self.resolve_timeout.is_zero() {
            return Err(Error::Config(
                "Resolve timeout must be greater than zero".to_string(),
            ));
        }

        if !(self.min_speed > 0.0 && self.min_speed <= 1.0 && self.max_speed >= 1.0) {
            return Err(Error::Config(format!(
                "Speed range {}..={} must be positive and include 1.0",
                self.min_speed, self.max_speed
            )));
        }

        Ok(())
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Maximum cache size in bytes.
    pub fn cache_size_bytes(&self) -> u64 {
        self.cache_size_mb as u64 * 1024 * 1024
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Cache directory is not empty
    /// - Cache size is reasonable (> 0 and < 100GB)
    /// - Event buffer can hold at least one event
    /// - Tuning values are consistent
    pub fn validate(&self) -> Result<()> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("Cache directory cannot be empty".to_string()));
        }

        if self.cache_size_mb == 0 {
            return Err(Error::Config(
                "Cache size must be greater than 0 MB".to_string(),
            ));
        }

        if self.cache_size_mb > 100_000 {
            return Err(Error::Config(
                "Cache size exceeds maximum of 100GB (100,000 MB)".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        self.tuning.validate()
    }
}

fn media_player_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "MediaPlayer".to_string(),
        message: "A MediaPlayer adapter is required to drive playback. \
                 Android: wrap ExoPlayer/Media3. iOS: wrap AVPlayer. \
                 Tests: inject a scripted fake."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for cache downloads. \
                 Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                 Mobile: inject the platform HTTP stack."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Ok(Arc::new(bridge_desktop::ReqwestHttpClient::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(Error::CapabilityMissing {
        capability: "FileSystemAccess".to_string(),
        message: "FileSystemAccess implementation is required for the audio cache. \
                 Desktop: enable the 'desktop-shims' feature to use TokioFileSystem. \
                 Mobile: inject access to the app-private cache directory."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Ok(Arc::new(bridge_desktop::TokioFileSystem::new()))
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    cache_dir: Option<PathBuf>,
    cache_size_mb: Option<usize>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    media_player: Option<Arc<dyn MediaPlayer>>,
    tuning: PlaybackTuning,
    features: FeatureFlags,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the cache directory.
    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    /// Sets the maximum cache size in megabytes.
    ///
    /// Default: 1024 MB (1 GB)
    pub fn cache_size_mb(mut self, size_mb: usize) -> Self {
        self.cache_size_mb = Some(size_mb);
        self
    }

    /// Sets the HTTP client implementation.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the file system access implementation.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Sets the media player adapter (required).
    pub fn media_player(mut self, player: Arc<dyn MediaPlayer>) -> Self {
        self.media_player = Some(player);
        self
    }

    /// Replaces the engine tuning.
    pub fn tuning(mut self, tuning: PlaybackTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Enables or disables background caching of streamed tracks.
    ///
    /// Default: true
    pub fn enable_stream_cache(mut self, enabled: bool) -> Self {
        self.features.enable_stream_cache = enabled;
        self
    }

    /// Enables or disables session restore on startup.
    ///
    /// Default: true
    pub fn restore_session(mut self, enabled: bool) -> Self {
        self.features.restore_session = enabled;
        self
    }

    /// Sets all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Sets the event bus buffer size.
    ///
    /// Default: [`DEFAULT_EVENT_BUFFER_SIZE`](crate::events::DEFAULT_EVENT_BUFFER_SIZE)
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - `Error::Config` when the cache directory is missing or a value is out of range
    /// - `Error::CapabilityMissing` when a required bridge has no implementation
    pub fn build(self) -> Result<CoreConfig> {
        let cache_dir = self.cache_dir.ok_or_else(|| {
            Error::Config("Cache directory is required. Use .cache_dir() to set it.".to_string())
        })?;

        let media_player = self.media_player.ok_or_else(media_player_missing_error)?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let config = CoreConfig {
            cache_dir,
            cache_size_mb: self.cache_size_mb.unwrap_or(1024),
            http_client,
            file_system,
            media_player,
            tuning: self.tuning,
            features: self.features,
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{DownloadStream, HttpRequest, LoadRequest, PlayerEventSender, SourceResolver};
    use bytes::Bytes;
    use std::path::Path;

    struct NoopPlayer;

    #[async_trait]
    impl MediaPlayer for NoopPlayer {
        fn attach(&self, _events: PlayerEventSender, _resolver: Arc<dyn SourceResolver>) {}
        async fn load(&self, _request: LoadRequest) -> BridgeResult<()> {
            Ok(())
        }
        async fn play(&self) -> BridgeResult<()> {
            Ok(())
        }
        async fn pause(&self) -> BridgeResult<()> {
            Ok(())
        }
        async fn stop(&self) -> BridgeResult<()> {
            Ok(())
        }
        async fn seek(&self, _position: Duration) -> BridgeResult<()> {
            Ok(())
        }
        async fn set_speed(&self, _speed: f32) -> BridgeResult<()> {
            Ok(())
        }
        async fn position(&self) -> BridgeResult<Duration> {
            Ok(Duration::ZERO)
        }
        async fn duration(&self) -> BridgeResult<Option<Duration>> {
            Ok(None)
        }
        async fn release(&self) -> BridgeResult<()> {
            Ok(())
        }
    }

    struct NoopHttp;

    #[async_trait]
    impl HttpClient for NoopHttp {
        async fn download_stream(&self, _request: HttpRequest) -> BridgeResult<DownloadStream> {
            Err(bridge_traits::BridgeError::NotAvailable("offline".to_string()))
        }
    }

    struct NoopFs;

    #[async_trait]
    impl FileSystemAccess for NoopFs {
        async fn exists(&self, _path: &Path) -> BridgeResult<bool> {
            Ok(false)
        }
        async fn create_dir_all(&self, _path: &Path) -> BridgeResult<()> {
            Ok(())
        }
        async fn read_file(&self, _path: &Path) -> BridgeResult<Bytes> {
            Ok(Bytes::new())
        }
        async fn write_file(&self, _path: &Path, _data: Bytes) -> BridgeResult<()> {
            Ok(())
        }
        async fn delete_file(&self, _path: &Path) -> BridgeResult<()> {
            Ok(())
        }
        async fn rename(&self, _from: &Path, _to: &Path) -> BridgeResult<()> {
            Ok(())
        }
        async fn list_directory(&self, _path: &Path) -> BridgeResult<Vec<PathBuf>> {
            Ok(Vec::new())
        }
        async fn open_write_stream(
            &self,
            _path: &Path,
        ) -> BridgeResult<Box<dyn tokio::io::AsyncWrite + Send + Unpin>> {
            Ok(Box::new(tokio::io::sink()))
        }
    }

    fn complete_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .cache_dir("/tmp/player-core")
            .media_player(Arc::new(NoopPlayer))
            .http_client(Arc::new(NoopHttp))
            .file_system(Arc::new(NoopFs))
    }

    #[test]
    fn test_build_with_all_bridges() {
        let config = complete_builder().cache_size_mb(256).build().unwrap();

        assert_eq!(config.cache_dir, PathBuf::from("/tmp/player-core"));
        assert_eq!(config.cache_size_mb, 256);
        assert_eq!(config.cache_size_bytes(), 256 * 1024 * 1024);
        assert_eq!(config.features, FeatureFlags::default());
        assert_eq!(config.tuning, PlaybackTuning::default());
    }

    #[test]
    fn test_missing_cache_dir() {
        let result = CoreConfig::builder()
            .media_player(Arc::new(NoopPlayer))
            .build();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("cache_dir")));
    }

    #[test]
    fn test_missing_media_player() {
        let result = CoreConfig::builder()
            .cache_dir("/tmp/player-core")
            .http_client(Arc::new(NoopHttp))
            .file_system(Arc::new(NoopFs))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "MediaPlayer")
            }
            other => panic!("expected CapabilityMissing, got {:?}", other.map(|_| ())),
        }
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_http_client_without_shims() {
        let result = CoreConfig::builder()
            .cache_dir("/tmp/player-core")
            .media_player(Arc::new(NoopPlayer))
            .file_system(Arc::new(NoopFs))
            .build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { capability, .. }) if capability == "HttpClient"
        ));
    }

    #[test]
    fn test_cache_size_bounds() {
        assert!(complete_builder().cache_size_mb(0).build().is_err());
        assert!(complete_builder().cache_size_mb(100_001).build().is_err());
        assert!(complete_builder().cache_size_mb(100_000).build().is_ok());
    }

    #[test]
    fn test_feature_flags() {
        let config = complete_builder()
            .enable_stream_cache(false)
            .restore_session(false)
            .build()
            .unwrap();

        assert!(!config.features.enable_stream_cache);
        assert!(!config.features.restore_session);
    }

    #[test]
    fn test_tuning_validation() {
        let bad_poll = PlaybackTuning::default().with_position_poll_interval(Duration::ZERO);
        assert!(complete_builder().tuning(bad_poll).build().is_err());

        let bad_speed = PlaybackTuning::default().with_speed_range(1.5, 3.0);
        assert!(bad_speed.validate().is_err());

        let tuning = PlaybackTuning::default();
        assert!(tuning.accepts_speed(1.0));
        assert!(tuning.accepts_speed(0.25));
        assert!(!tuning.accepts_speed(0.1));
        assert!(!tuning.accepts_speed(f32::NAN));
    }

    #[test]
    fn test_tuning_builders() {
        let tuning = PlaybackTuning::default()
            .with_resolve_timeout(Duration::from_secs(5))
            .with_resolved_url_ttl(Duration::from_secs(90));

        assert_eq!(tuning.resolve_timeout, Duration::from_secs(5));
        assert_eq!(tuning.resolved_url_ttl, Duration::from_secs(90));
        assert!(tuning.validate().is_ok());
    }
}
