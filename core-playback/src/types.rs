//! Domain model shared by the queue, cache and playback engines.

use crate::error::{PlaybackError, Result};
use bridge_traits::MediaMetadata;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const STREAM_SCHEME: &str = "stream://";
const FILE_SCHEME: &str = "file://";

// ============================================================================
// Track
// ============================================================================

/// A playable audio item.
///
/// Tracks are never mutated in place. Context overrides such as an album name
/// or a cached local copy produce derived values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration: Option<Duration>,
    pub locator: TrackLocator,
    pub artwork: Option<String>,
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        locator: TrackLocator,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            album: None,
            duration: None,
            locator,
            artwork: None,
        }
    }

    pub fn with_album(&self, album: impl Into<String>) -> Self {
        Self {
            album: Some(album.into()),
            ..self.clone()
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_artwork(mut self, artwork: impl Into<String>) -> Self {
        self.artwork = Some(artwork.into());
        self
    }

    /// Copy of this track pointing at a local file, metadata unchanged.
    pub fn with_local_path(&self, path: impl Into<PathBuf>) -> Self {
        Self {
            locator: TrackLocator::Local { path: path.into() },
            ..self.clone()
        }
    }

    /// Streaming reference, when this track is not a local file.
    pub fn stream_ref(&self) -> Option<&StreamRef> {
        match &self.locator {
            TrackLocator::Streaming(stream) => Some(stream),
            TrackLocator::Local { .. } => None,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self.locator, TrackLocator::Local { .. })
    }

    /// Metadata forwarded to the player and the media session.
    pub fn metadata(&self) -> MediaMetadata {
        MediaMetadata {
            track_id: self.id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            artwork: self.artwork.clone(),
            duration: self.duration,
        }
    }
}

// ============================================================================
// Locators
// ============================================================================

/// Identifies a track hosted by an external catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamRef {
    pub provider: String,
    pub track_id: String,
}

impl StreamRef {
    pub fn new(provider: impl Into<String>, track_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            track_id: track_id.into(),
        }
    }

    /// Key under which the reference is registered for lazy resolution.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StreamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", STREAM_SCHEME, self.provider, self.track_id)
    }
}

/// Where the audio of a track lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackLocator {
    Local { path: PathBuf },
    Streaming(StreamRef),
}

impl TrackLocator {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        TrackLocator::Local { path: path.into() }
    }

    pub fn streaming(provider: impl Into<String>, track_id: impl Into<String>) -> Self {
        TrackLocator::Streaming(StreamRef::new(provider, track_id))
    }

    /// Parses `stream://<provider>/<track-id>`, `file://<path>` or a plain path.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PlaybackError::InvalidLocator("empty locator".to_string()));
        }

        if let Some(rest) = text.strip_prefix(STREAM_SCHEME) {
            let (provider, track_id) = rest.split_once('/').ok_or_else(|| {
                PlaybackError::InvalidLocator(format!("missing track id in {}", text))
            })?;
            if provider.is_empty() || track_id.is_empty() {
                return Err(PlaybackError::InvalidLocator(text.to_string()));
            }
            return Ok(Self::streaming(provider, track_id));
        }

        if let Some(path) = text.strip_prefix(FILE_SCHEME) {
            if path.is_empty() {
                return Err(PlaybackError::InvalidLocator(text.to_string()));
            }
            return Ok(Self::local(path));
        }

        if text.contains("://") {
            return Err(PlaybackError::InvalidLocator(format!(
                "unsupported scheme in {}",
                text
            )));
        }

        Ok(Self::local(text))
    }
}

impl FromStr for TrackLocator {
    type Err = PlaybackError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TrackLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackLocator::Local { path } => write!(f, "{}", path.display()),
            TrackLocator::Streaming(stream) => stream.fmt(f),
        }
    }
}

// ============================================================================
// Modes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    One,
    All,
}

impl RepeatMode {
    /// Next mode in the notification-button cycle: off, all, one.
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::One => "one",
            RepeatMode::All => "all",
        }
    }
}

/// Which catalogue feeds playback requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    #[default]
    Offline,
    Streaming,
}

// ============================================================================
// Queue entries
// ============================================================================

/// Identity of one queue slot.
///
/// The same track can appear several times in a queue; entry ids tell the
/// copies apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: EntryId,
    pub track: Track,
}

impl QueueEntry {
    pub fn new(track: Track) -> Self {
        Self {
            id: EntryId::new(),
            track,
        }
    }
}

// ============================================================================
// Playback state
// ============================================================================

/// Lifecycle of the current track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loading,
    Buffering,
    Playing,
    Paused,
    Ended,
    Error,
}

/// Error surfaced to observers of the playback state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackErrorInfo {
    pub code: String,
    pub message: String,
}

/// Snapshot of the playback core, replaced as a whole on every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub current_track: Option<Track>,
    pub current_entry: Option<EntryId>,
    pub status: PlaybackStatus,
    pub is_playing: bool,
    pub is_buffering: bool,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub repeat_mode: RepeatMode,
    pub shuffle_enabled: bool,
    pub queue: Arc<[QueueEntry]>,
    pub current_index: Option<usize>,
    pub speed: f32,
    pub error: Option<PlaybackErrorInfo>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_track: None,
            current_entry: None,
            status: PlaybackStatus::Idle,
            is_playing: false,
            is_buffering: false,
            position: Duration::ZERO,
            duration: None,
            repeat_mode: RepeatMode::Off,
            shuffle_enabled: false,
            queue: Arc::from(Vec::new()),
            current_index: None,
            speed: 1.0,
            error: None,
        }
    }
}

impl PlaybackState {
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn current_track_id(&self) -> Option<&str> {
        self.current_track.as_ref().map(|t| t.id.as_str())
    }
}
