//! # Playback Error Types
//!
//! Error types for queue, resolution, cache and player operations.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Coarse error category used for propagation decisions.
///
/// Only [`ErrorKind::Playback`] and [`ErrorKind::Resolution`] failures of the
/// active track reach the observable playback state. Cache failures are
/// logged and swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Resolution,
    Playback,
    Cache,
    Queue,
    Internal,
}

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// Track was not found in the catalogue or cache.
    #[error("Track not found: {0}")]
    TrackNotFound(String),

    /// Stream URL lookup failed or returned nothing.
    #[error("Failed to resolve stream for {track_id}: {message}")]
    Resolution { track_id: String, message: String },

    /// Locator text could not be parsed.
    #[error("Invalid track locator: {0}")]
    InvalidLocator(String),

    // ========================================================================
    // Playback Control Errors
    // ========================================================================
    /// The underlying player reported a failure.
    #[error("Playback failed [{code}]: {message}")]
    PlaybackFailed { code: String, message: String },

    /// Speed outside the accepted range.
    #[error("Invalid playback speed: {0}")]
    InvalidSpeed(f32),

    /// The engine task is no longer running.
    #[error("Playback engine stopped")]
    EngineStopped,

    // ========================================================================
    // Queue Errors
    // ========================================================================
    /// Operation requires a non-empty queue.
    #[error("Queue is empty")]
    QueueEmpty,

    /// Index outside the queue.
    #[error("Queue index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    // ========================================================================
    // Cache Errors
    // ========================================================================
    /// Cache operation failed.
    #[error("Cache error: {0}")]
    CacheError(String),

    /// Track is not available in the cache.
    #[error("Track not cached: {0}")]
    NotCached(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Host bridge failure.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlaybackError::Resolution { .. } | PlaybackError::InvalidLocator(_) => {
                ErrorKind::Resolution
            }
            PlaybackError::TrackNotFound(_)
            | PlaybackError::PlaybackFailed { .. }
            | PlaybackError::InvalidSpeed(_) => ErrorKind::Playback,
            PlaybackError::EngineStopped => ErrorKind::Connection,
            PlaybackError::QueueEmpty | PlaybackError::IndexOutOfBounds { .. } => {
                ErrorKind::Queue
            }
            PlaybackError::CacheError(_) | PlaybackError::NotCached(_) | PlaybackError::Io(_) => {
                ErrorKind::Cache
            }
            PlaybackError::Bridge(BridgeError::Player { .. }) => ErrorKind::Playback,
            PlaybackError::Bridge(_) | PlaybackError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::Resolution { .. }
                | PlaybackError::CacheError(_)
                | PlaybackError::Bridge(BridgeError::OperationFailed(_))
                | PlaybackError::Io(_)
        )
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::Resolution { .. }
                | PlaybackError::Bridge(BridgeError::OperationFailed(_))
        )
    }

    /// Code and message pair shown to the user for errors that reach the
    /// playback state.
    pub fn code(&self) -> &str {
        match self {
            PlaybackError::PlaybackFailed { code, .. } => code,
            PlaybackError::Bridge(BridgeError::Player { code, .. }) => code,
            PlaybackError::Resolution { .. } | PlaybackError::InvalidLocator(_) => "resolution",
            PlaybackError::TrackNotFound(_) => "not_found",
            PlaybackError::InvalidSpeed(_) => "invalid_speed",
            _ => "internal",
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
