//! # Playback Core
//!
//! Queue management, stream resolution, the audio cache and the playback
//! engine that drives a host [`MediaPlayer`](bridge_traits::MediaPlayer).
//!
//! ## Overview
//!
//! This crate handles:
//! - An ordered play queue with shuffle and repeat modes
//! - Resolving streaming track ids into playable URLs, with a short-lived memo
//! - An LRU-bounded on-disk cache for streamed audio
//! - A single-writer engine that turns commands and player events into
//!   [`PlaybackState`] snapshots
//!
//! ## Components
//!
//! - [`QueueEngine`] - Pure queue logic, no I/O
//! - [`StreamResolver`] - Catalog lookups with timeout and memoization
//! - [`LocalCache`](cache::LocalCache) - Streamed downloads, manifest, eviction
//! - [`StreamingService`] - Picks cached, local or deferred sources
//! - [`PlaybackEngine`] - The actor; use its [`PlaybackHandle`] to drive it
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::{PlaybackCommand, PlaybackEngine, StreamingService};
//!
//! let engine = PlaybackEngine::new(player, streaming, tuning)
//!     .with_event_bus(bus.clone())
//!     .spawn();
//!
//! let handle = engine.handle();
//! handle.send(PlaybackCommand::PlayQueue { tracks, start_index: 0 }).await?;
//! ```

pub mod cache;
pub mod command;
pub mod engine;
pub mod error;
pub mod queue;
pub mod resolver;
pub mod shuffle;
pub mod streaming;
pub mod traits;
pub mod types;

pub use command::{MediaCommand, PlaybackCommand};
pub use engine::{PlaybackEngine, PlaybackHandle, RunningEngine};
pub use error::{ErrorKind, PlaybackError, Result};
pub use queue::{AdvanceOutcome, Direction, QueueEngine, RemoveOutcome};
pub use resolver::{StreamRegistry, StreamResolver};
pub use streaming::{PreparedTrack, StreamingService};
pub use traits::{LocalCatalog, NoopPersistence, PlaybackPersistence, StreamingCatalog};
pub use types::{
    AppMode, EntryId, PlaybackErrorInfo, PlaybackState, PlaybackStatus, QueueEntry, RepeatMode,
    StreamRef, Track, TrackLocator,
};
