//! Media player bridge traits and supporting types.
//!
//! The core never decodes audio itself. Hosts wrap their native player
//! (ExoPlayer, AVPlayer, a desktop engine) in a [`MediaPlayer`] adapter and the
//! playback engine drives it through this contract. The adapter reports what
//! happens on the native side through a [`PlayerEventSender`] handed over in
//! [`MediaPlayer::attach`].
//!
//! Streaming tracks are loaded as [`AudioSource::Deferred`] sources: the
//! adapter asks the attached [`SourceResolver`] for a concrete URL only when it
//! actually opens the stream, so playback can start before any download of the
//! same track has finished.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Channel the adapter uses to push [`PlayerEvent`]s back into the core.
pub type PlayerEventSender = mpsc::UnboundedSender<PlayerEvent>;

/// Receiving half of [`PlayerEventSender`].
pub type PlayerEventReceiver = mpsc::UnboundedReceiver<PlayerEvent>;

/// Source handed to the underlying player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// File readable by the host runtime.
    LocalFile { path: PathBuf },
    /// Reference resolved lazily through the attached [`SourceResolver`].
    Deferred { key: String },
}

impl AudioSource {
    /// Whether opening this source needs the network.
    pub fn is_remote(&self) -> bool {
        matches!(self, AudioSource::Deferred { .. })
    }
}

/// Display metadata forwarded to the platform media session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaMetadata {
    pub track_id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub artwork: Option<String>,
    pub duration: Option<Duration>,
}

/// A single load instruction for the underlying player.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub source: AudioSource,
    pub metadata: MediaMetadata,
    /// Position to start from once the source is ready.
    pub start_position: Duration,
    /// Start playing as soon as the source is ready.
    pub play_when_ready: bool,
}

impl LoadRequest {
    pub fn new(source: AudioSource, metadata: MediaMetadata) -> Self {
        Self {
            source,
            metadata,
            start_position: Duration::ZERO,
            play_when_ready: true,
        }
    }

    pub fn start_at(mut self, position: Duration) -> Self {
        self.start_position = position;
        self
    }

    pub fn paused(mut self) -> Self {
        self.play_when_ready = false;
        self
    }
}

/// Native player status, mirroring the usual idle/buffering/ready/ended cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerStatus {
    Idle,
    Buffering,
    Ready,
    Ended,
}

/// Events emitted by the adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// The native status changed.
    StatusChanged(PlayerStatus),
    /// The player started or stopped producing audio.
    PlayingChanged(bool),
    /// The current source failed. `code` is adapter specific.
    Error { code: String, message: String },
    /// The current source reached its natural end.
    Ended,
}

/// Shuffle/repeat flags and metadata shown by notification controls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionInfo {
    pub metadata: Option<MediaMetadata>,
    pub is_playing: bool,
    pub shuffle_enabled: bool,
    /// One of `off`, `one`, `all`.
    pub repeat_mode: String,
    pub speed: f32,
}

/// Resolves [`AudioSource::Deferred`] keys into playable URLs at load time.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Returns the concrete URL for a deferred key.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotFound`](crate::BridgeError::NotFound) for keys
    /// that were never registered, and an operation error when the lookup
    /// itself fails.
    async fn resolve(&self, key: &str) -> Result<String>;
}

/// Adapter over the host's native media player.
///
/// Implementations own exactly one native player instance. Calls are issued
/// from the playback engine's task only, so adapters do not need to guard
/// against concurrent control calls.
#[async_trait]
pub trait MediaPlayer: Send + Sync {
    /// Wire the adapter to the core. Called once before any other method.
    fn attach(&self, events: PlayerEventSender, resolver: Arc<dyn SourceResolver>);

    /// Replace the current source.
    async fn load(&self, request: LoadRequest) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    /// Stop playback and drop buffered data. The source stays loaded.
    async fn stop(&self) -> Result<()>;

    async fn seek(&self, position: Duration) -> Result<()>;

    /// Playback speed multiplier, `1.0` being normal speed.
    async fn set_speed(&self, speed: f32) -> Result<()>;

    async fn position(&self) -> Result<Duration>;

    /// Duration of the loaded source when the container reports one.
    async fn duration(&self) -> Result<Option<Duration>>;

    /// Update the platform media session / notification.
    async fn publish_session(&self, session: SessionInfo) -> Result<()> {
        let _ = session;
        Ok(())
    }

    /// Release native resources. The adapter is unusable afterwards.
    async fn release(&self) -> Result<()>;
}
