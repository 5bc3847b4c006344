//! # Collaborator Traits
//!
//! Contracts for the services the playback core consumes but does not own:
//! the on-device catalogue, the streaming catalogue and durable persistence.
//!
//! Implementations live in the host application (media store queries, the
//! streaming provider's client, a settings/database layer). All traits are
//! `Send + Sync` so they can be shared with background tasks behind an `Arc`.

use crate::error::Result;
use crate::types::{PlaybackState, Track};
use async_trait::async_trait;

/// Tracks stored on the device.
#[async_trait]
pub trait LocalCatalog: Send + Sync {
    /// All local tracks in a stable, deterministic order.
    async fn list_local_tracks(&self) -> Result<Vec<Track>>;
}

/// Search, trending lists and stream URL lookup for a streaming provider.
#[async_trait]
pub trait StreamingCatalog: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>>;

    async fn get_trending(&self, limit: usize) -> Result<Vec<Track>>;

    /// Playable URL for a provider track id.
    ///
    /// `Ok(None)` means the provider had no stream for this id.
    async fn resolve_stream_url(&self, provider_track_id: &str) -> Result<Option<String>>;
}

/// Durable storage for the last session.
#[async_trait]
pub trait PlaybackPersistence: Send + Sync {
    async fn save_now_playing(&self, state: &PlaybackState) -> Result<()>;

    async fn load_last_playback_state(&self) -> Result<Option<PlaybackState>>;

    async fn save_queue_snapshot(&self, tracks: &[Track]) -> Result<()>;

    async fn load_queue_snapshot(&self) -> Result<Vec<Track>>;
}

/// Persistence that keeps nothing. Used when the host provides none.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPersistence;

#[async_trait]
impl PlaybackPersistence for NoopPersistence {
    async fn save_now_playing(&self, _state: &PlaybackState) -> Result<()> {
        Ok(())
    }

    async fn load_last_playback_state(&self) -> Result<Option<PlaybackState>> {
        Ok(None)
    }

    async fn save_queue_snapshot(&self, _tracks: &[Track]) -> Result<()> {
        Ok(())
    }

    async fn load_queue_snapshot(&self) -> Result<Vec<Track>> {
        Ok(Vec::new())
    }
}
