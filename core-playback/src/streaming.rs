//! # Streaming Source Preparation
//!
//! Decides how a queue track is handed to the media player.
//!
//! ## Flow
//!
//! ```text
//!   Track ──local──────────────────────────────> LocalFile
//!     │
//!     └─streaming─┬─ cache hit ──────────────────> LocalFile (cached copy)
//!                 │
//!                 └─ cache miss ─> register key ─> Deferred { key }
//!                                       │
//!                                       └─ (after warm-up delay)
//!                                          resolve URL ─> LocalCache::download
//! ```
//!
//! A cache hit never touches the network. On a miss playback starts right
//! away on a deferred source the player resolves itself; the cache download
//! runs in a background task and its failures are only logged.

use crate::cache::{DownloadOutcome, LocalCache};
use crate::resolver::{StreamRegistry, StreamResolver};
use crate::types::{StreamRef, Track, TrackLocator};
use bridge_traits::{AudioSource, SourceResolver};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// A track ready to be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTrack {
    /// The track as it will be played. Cache hits carry the local path.
    pub track: Track,
    pub source: AudioSource,
    pub from_cache: bool,
}

/// Prepares audio sources and warms the cache for streamed tracks.
pub struct StreamingService {
    registry: Arc<StreamRegistry>,
    cache: Option<Arc<LocalCache>>,
    warmup_delay: Duration,
    /// Track ids with a warm-up task scheduled or running.
    pending: Arc<Mutex<HashSet<String>>>,
    cancel: CancellationToken,
}

impl StreamingService {
    /// Create a service. Without a cache every streamed track is deferred and
    /// nothing is downloaded.
    pub fn new(
        resolver: Arc<StreamResolver>,
        cache: Option<Arc<LocalCache>>,
        warmup_delay: Duration,
    ) -> Self {
        Self {
            registry: Arc::new(StreamRegistry::new(resolver)),
            cache,
            warmup_delay,
            pending: Arc::new(Mutex::new(HashSet::new())),
            cancel: CancellationToken::new(),
        }
    }

    /// Resolver the media player uses for deferred sources.
    pub fn source_resolver(&self) -> Arc<dyn SourceResolver> {
        self.registry.clone()
    }

    pub fn cache(&self) -> Option<&Arc<LocalCache>> {
        self.cache.as_ref()
    }

    /// Forget a memoized URL after the player failed on it.
    pub fn invalidate(&self, track: &Track) {
        if let Some(stream) = track.stream_ref() {
            self.registry.resolver().invalidate(stream);
        }
    }

    /// Stop pending background downloads.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    #[instrument(skip(self, track), fields(track_id = %track.id))]
    pub async fn prepare(&self, track: &Track) -> PreparedTrack {
        let stream = match &track.locator {
            TrackLocator::Local { path } => {
                return PreparedTrack {
                    track: track.clone(),
                    source: AudioSource::LocalFile { path: path.clone() },
                    from_cache: false,
                };
            }
            TrackLocator::Streaming(stream) => stream,
        };

        if let Some(cache) = &self.cache {
            if let Some(path) = cache.cached_path(&stream.track_id).await {
                debug!("Serving streamed track from cache");
                return PreparedTrack {
                    track: track.with_local_path(path.clone()),
                    source: AudioSource::LocalFile { path },
                    from_cache: true,
                };
            }
        }

        let key = self.registry.register(stream);
        if let Some(cache) = &self.cache {
            self.spawn_cache_fill(Arc::clone(cache), stream.clone());
        }

        PreparedTrack {
            track: track.clone(),
            source: AudioSource::Deferred { key },
            from_cache: false,
        }
    }

    fn spawn_cache_fill(&self, cache: Arc<LocalCache>, stream: StreamRef) {
        if cache.is_downloading(&stream.track_id)
            || !self.pending.lock().insert(stream.track_id.clone())
        {
            debug!(track_id = %stream.track_id, "Cache warm-up already scheduled");
            return;
        }

        let resolver = Arc::clone(self.registry.resolver());
        let delay = self.warmup_delay;
        let cancel = self.cancel.clone();
        let pending = Arc::clone(&self.pending);

        tokio::spawn(async move {
            Self::fill_cache(cache, resolver, stream.clone(), delay, cancel).await;
            pending.lock().remove(&stream.track_id);
        });
    }

    async fn fill_cache(
        cache: Arc<LocalCache>,
        resolver: Arc<StreamResolver>,
        stream: StreamRef,
        delay: Duration,
        cancel: CancellationToken,
    ) {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        let url = match resolver.resolve(&stream).await {
            Ok(url) => url,
            Err(e) => {
                warn!(track_id = %stream.track_id, error = %e, "Skipping cache download");
                return;
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(track_id = %stream.track_id, "Cache download cancelled");
            }
            result = cache.download(&stream.track_id, &url, None) => match result {
                Ok(DownloadOutcome::Downloaded(entry)) => {
                    info!(track_id = %entry.track_id, size_bytes = entry.size_bytes, "Streamed track cached");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(track_id = %stream.track_id, error = %e, "Background cache download failed");
                }
            },
        }
    }
}

impl Drop for StreamingService {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
