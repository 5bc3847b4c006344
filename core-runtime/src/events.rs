//! # Events
//!
//! Discrete transitions published by the engine, the cache and the
//! connector over a `tokio::sync::broadcast` channel. Continuous state
//! (position, buffering, queue contents) lives in the `PlaybackState` watch
//! channel instead.
//!
//! ```text
//!   PlaybackEngine ──┐                 ┌──> UI layer
//!   LocalCache ──────┼──> EventBus ────┼──> media notification
//!   ServiceConnector ┘                 └──> analytics
//! ```
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut stream = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::Completed {
//!     track_id: "XYZ".to_string(),
//! }))
//! .ok();
//!
//! assert_eq!(stream.recv().await.unwrap().description(), "Track completed");
//! # }
//! ```
//!
//! A slow subscriber gets `RecvError::Lagged(n)` and keeps receiving;
//! `RecvError::Closed` means the bus is gone. `emit` fails only when nobody
//! is subscribed, so publishers discard its result with `.ok()`.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Events a subscriber may fall behind before it sees `Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Everything published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Playback(PlaybackEvent),
    Queue(QueueEvent),
    Cache(CacheEvent),
    Connection(ConnectionEvent),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Queue(e) => e.description(),
            CoreEvent::Cache(e) => e.description(),
            CoreEvent::Connection(e) => e.description(),
        }
    }

    /// How loudly a generic listener should report this event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::QueueExhausted { .. }) => EventSeverity::Warning,
            CoreEvent::Cache(CacheEvent::DownloadFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Connection(ConnectionEvent::CommandDropped { .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Playback(PlaybackEvent::TrackChanged { .. })
            | CoreEvent::Cache(CacheEvent::DownloadCompleted { .. })
            | CoreEvent::Connection(ConnectionEvent::Connected) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to audio playback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// The engine moved to a different queue entry.
    TrackChanged {
        track_id: String,
        title: String,
        /// Index in the current queue order.
        index: usize,
    },
    /// Playback started or resumed.
    Started {
        track_id: String,
        /// Position when playback started (milliseconds).
        position_ms: u64,
    },
    /// Playback paused.
    Paused {
        track_id: String,
        /// Position when paused (milliseconds).
        position_ms: u64,
    },
    /// Playback stopped explicitly or because the queue ended.
    Stopped { track_id: Option<String> },
    /// Track finished playing naturally.
    Completed { track_id: String },
    /// The current track failed in the underlying player.
    Error {
        track_id: Option<String>,
        /// Player or resolver error code.
        code: String,
        message: String,
        /// Whether the engine will try the next track.
        recoverable: bool,
    },
    /// Every track in the queue failed in a row; playback stopped.
    QueueExhausted {
        /// Length of the failure streak.
        failures: usize,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::TrackChanged { .. } => "Track changed",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Completed { .. } => "Track completed",
            PlaybackEvent::Error { .. } => "Playback error",
            PlaybackEvent::QueueExhausted { .. } => "Queue exhausted after repeated failures",
        }
    }
}

// ============================================================================
// Queue Events
// ============================================================================

/// Events related to the playback queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum QueueEvent {
    /// Contents or order changed.
    Changed {
        length: usize,
        current_index: Option<usize>,
    },
    /// Shuffle was switched on or off.
    ShuffleChanged { enabled: bool },
    /// Repeat mode changed (`off`, `one`, `all`).
    RepeatChanged { mode: String },
}

impl QueueEvent {
    fn description(&self) -> &str {
        match self {
            QueueEvent::Changed { .. } => "Queue changed",
            QueueEvent::ShuffleChanged { .. } => "Shuffle toggled",
            QueueEvent::RepeatChanged { .. } => "Repeat mode changed",
        }
    }
}

// ============================================================================
// Cache Events
// ============================================================================

/// Events related to the on-disk audio cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    /// A background download started.
    DownloadStarted { track_id: String },
    /// Incremental download progress.
    DownloadProgress {
        track_id: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },
    /// The track is now served from disk.
    DownloadCompleted { track_id: String, size_bytes: u64 },
    /// The download failed. Playback is unaffected.
    DownloadFailed { track_id: String, message: String },
    /// An entry was removed to stay under the size limit or on request.
    Evicted { track_id: String, size_bytes: u64 },
    /// The whole cache was cleared.
    Cleared { entries_removed: usize },
}

impl CacheEvent {
    fn description(&self) -> &str {
        match self {
            CacheEvent::DownloadStarted { .. } => "Cache download started",
            CacheEvent::DownloadProgress { .. } => "Cache download progress",
            CacheEvent::DownloadCompleted { .. } => "Cache download completed",
            CacheEvent::DownloadFailed { .. } => "Cache download failed",
            CacheEvent::Evicted { .. } => "Cache entry evicted",
            CacheEvent::Cleared { .. } => "Cache cleared",
        }
    }
}

// ============================================================================
// Connection Events
// ============================================================================

/// Events related to the UI-side service connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ConnectionEvent {
    /// Binding to the playback service started.
    Connecting,
    /// Bound; commands are forwarded.
    Connected,
    /// Unbound or the service went away.
    Disconnected,
    /// A command was issued while not connected and was dropped.
    CommandDropped { command: String },
}

impl ConnectionEvent {
    fn description(&self) -> &str {
        match self {
            ConnectionEvent::Connecting => "Connecting to playback service",
            ConnectionEvent::Connected => "Connected to playback service",
            ConnectionEvent::Disconnected => "Disconnected from playback service",
            ConnectionEvent::CommandDropped { .. } => "Command dropped while disconnected",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus is cheap; every clone publishes into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let cache_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Cache(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive a matching event without waiting.
    ///
    /// Returns `None` if no matching events are currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
