//! # Stream Resolution
//!
//! Turns streaming references into playable URLs.
//!
//! [`StreamResolver`] wraps the streaming catalogue's URL lookup with a
//! timeout and a short-lived memo, so the lazy load of a track and the
//! background cache download of the same track share one lookup. Lookups
//! are single-flight per reference: a caller arriving while one is running
//! waits for it and reads its result from the memo.
//! [`StreamRegistry`] is the [`SourceResolver`] handed to the media player:
//! the engine registers each streaming reference before loading it and the
//! player resolves the key when it opens the stream.

use crate::error::{PlaybackError, Result};
use crate::traits::StreamingCatalog;
use crate::types::StreamRef;
use async_trait::async_trait;
use bridge_traits::{BridgeError, SourceResolver};
use core_runtime::logging::redact_url;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

const MEMO_CAPACITY: usize = 128;
const REGISTRY_CAPACITY: usize = 512;

fn capacity(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN)
}

struct ResolvedUrl {
    url: String,
    resolved_at: Instant,
}

/// Resolves streaming references through a [`StreamingCatalog`].
pub struct StreamResolver {
    catalog: Arc<dyn StreamingCatalog>,
    timeout: Duration,
    ttl: Duration,
    memo: Mutex<LruCache<StreamRef, ResolvedUrl>>,
    in_flight: Mutex<HashMap<StreamRef, Arc<tokio::sync::Mutex<()>>>>,
}

impl StreamResolver {
    pub fn new(catalog: Arc<dyn StreamingCatalog>, timeout: Duration, ttl: Duration) -> Self {
        Self {
            catalog,
            timeout,
            ttl,
            memo: Mutex::new(LruCache::new(capacity(MEMO_CAPACITY))),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a playable URL for `stream`.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::Resolution`] when the lookup fails, times out or the
    /// provider has no stream for the id.
    #[instrument(skip(self, stream), fields(provider = %stream.provider, track_id = %stream.track_id))]
    pub async fn resolve(&self, stream: &StreamRef) -> Result<String> {
        if let Some(url) = self.memoized(stream) {
            debug!("Using memoized stream URL");
            return Ok(url);
        }

        let gate = Arc::clone(self.in_flight.lock().entry(stream.clone()).or_default());
        let result = {
            let _turn = gate.lock().await;
            match self.memoized(stream) {
                Some(url) => {
                    debug!("Joined in-flight stream lookup");
                    Ok(url)
                }
                None => self.lookup(stream).await,
            }
        };

        let mut in_flight = self.in_flight.lock();
        // Only the map and this caller still hold the gate
        if Arc::strong_count(&gate) == 2 {
            in_flight.remove(stream);
        }
        result
    }

    async fn lookup(&self, stream: &StreamRef) -> Result<String> {
        let lookup = self.catalog.resolve_stream_url(&stream.track_id);
        let resolution_error = |message: String| PlaybackError::Resolution {
            track_id: stream.track_id.clone(),
            message,
        };

        let url = match tokio::time::timeout(self.timeout, lookup).await {
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Stream lookup timed out");
                return Err(resolution_error("lookup timed out".to_string()));
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Stream lookup failed");
                return Err(resolution_error(e.to_string()));
            }
            Ok(Ok(None)) => {
                warn!("Provider returned no stream");
                return Err(resolution_error("no stream available".to_string()));
            }
            Ok(Ok(Some(url))) => url,
        };

        debug!(url = %redact_url(&url), "Stream resolved");
        self.memo.lock().put(
            stream.clone(),
            ResolvedUrl {
                url: url.clone(),
                resolved_at: Instant::now(),
            },
        );

        Ok(url)
    }

    fn memoized(&self, stream: &StreamRef) -> Option<String> {
        let mut memo = self.memo.lock();
        let fresh = memo
            .get(stream)
            .filter(|r| r.resolved_at.elapsed() < self.ttl)
            .map(|r| r.url.clone());

        if fresh.is_none() {
            memo.pop(stream);
        }
        fresh
    }

    /// Forget a memoized URL, e.g. after the player rejected it.
    pub fn invalidate(&self, stream: &StreamRef) {
        self.memo.lock().pop(stream);
    }
}

/// Streaming references the player may ask for.
pub struct StreamRegistry {
    resolver: Arc<StreamResolver>,
    registered: Mutex<LruCache<String, StreamRef>>,
}

impl StreamRegistry {
    pub fn new(resolver: Arc<StreamResolver>) -> Self {
        Self {
            resolver,
            registered: Mutex::new(LruCache::new(capacity(REGISTRY_CAPACITY))),
        }
    }

    /// Register `stream` and return the key to load it under.
    pub fn register(&self, stream: &StreamRef) -> String {
        let key = stream.key();
        self.registered.lock().put(key.clone(), stream.clone());
        key
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.registered.lock().contains(key)
    }

    pub fn resolver(&self) -> &Arc<StreamResolver> {
        &self.resolver
    }
}

#[async_trait]
impl SourceResolver for StreamRegistry {
    async fn resolve(&self, key: &str) -> bridge_traits::error::Result<String> {
        let stream = self
            .registered
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(format!("Unregistered stream {}", key)))?;

        self.resolver
            .resolve(&stream)
            .await
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))
    }
}
