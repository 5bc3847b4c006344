//! Background playback service.
//!
//! Owns everything that must outlive a UI screen: the engine actor, the
//! stream resolver and the local cache. UI code never talks to it directly;
//! it binds through [`ServiceConnector`](crate::connector::ServiceConnector).

use crate::error::{CoreError, Result};
use async_trait::async_trait;
use core_playback::cache::{CacheConfig, LocalCache};
use core_playback::{
    MediaCommand, PlaybackEngine, PlaybackHandle, PlaybackPersistence, RunningEngine,
    StreamResolver, StreamingCatalog, StreamingService,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Something a [`ServiceConnector`](crate::connector::ServiceConnector) can
/// bind to.
#[async_trait]
pub trait PlaybackServiceHost: Send + Sync {
    /// Hand out a handle to the running engine.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotConnected`] once the service has shut down.
    async fn bind(&self) -> Result<PlaybackHandle>;
}

/// Entry point for OS media-session and notification controls.
#[derive(Clone)]
pub struct MediaCommandSender {
    handle: PlaybackHandle,
}

impl MediaCommandSender {
    /// Forward a media command. Commands are dropped when the engine's
    /// buffer is full or it has stopped.
    pub fn send(&self, command: MediaCommand) -> Result<()> {
        self.handle.try_send(command.into()).map_err(|e| {
            warn!(?command, error = %e, "Media command dropped");
            CoreError::from(e)
        })
    }
}

pub struct PlaybackService {
    engine: Mutex<Option<RunningEngine>>,
    handle: PlaybackHandle,
    streaming: Arc<StreamingService>,
    event_bus: EventBus,
}

impl PlaybackService {
    /// Build the cache, resolver and engine from `config` and start the engine.
    ///
    /// A cache that fails to initialize is logged and playback continues
    /// without one.
    #[instrument(skip_all)]
    pub async fn start(
        config: &CoreConfig,
        catalog: Arc<dyn StreamingCatalog>,
        persistence: Arc<dyn PlaybackPersistence>,
        event_bus: EventBus,
    ) -> Result<Self> {
        config.validate()?;
        let tuning = config.tuning.clone();

        let cache = if config.features.enable_stream_cache {
            Self::open_cache(config, &event_bus).await
        } else {
            None
        };

        let resolver = Arc::new(StreamResolver::new(
            catalog,
            tuning.resolve_timeout,
            tuning.resolved_url_ttl,
        ));
        let streaming = Arc::new(StreamingService::new(
            resolver,
            cache,
            tuning.cache_warmup_delay,
        ));

        let engine = PlaybackEngine::new(
            Arc::clone(&config.media_player),
            Arc::clone(&streaming),
            tuning,
        )
        .with_persistence(persistence)
        .with_event_bus(event_bus.clone())
        .restore_session(config.features.restore_session)
        .spawn();

        info!(
            stream_cache = streaming.cache().is_some(),
            restore_session = config.features.restore_session,
            "Playback service started"
        );

        Ok(Self {
            handle: engine.handle(),
            engine: Mutex::new(Some(engine)),
            streaming,
            event_bus,
        })
    }

    async fn open_cache(config: &CoreConfig, event_bus: &EventBus) -> Option<Arc<LocalCache>> {
        let cache_config =
            CacheConfig::new(config.cache_dir.clone()).with_max_size(config.cache_size_bytes());
        let cache = LocalCache::new(
            cache_config,
            Arc::clone(&config.file_system),
            Arc::clone(&config.http_client),
        )
        .with_event_bus(event_bus.clone());

        match cache.initialize().await {
            Ok(()) => Some(Arc::new(cache)),
            Err(e) => {
                warn!(error = %e, "Local cache unavailable, streaming without it");
                None
            }
        }
    }

    pub fn handle(&self) -> PlaybackHandle {
        self.handle.clone()
    }

    pub fn media_commands(&self) -> MediaCommandSender {
        MediaCommandSender {
            handle: self.handle.clone(),
        }
    }

    pub fn cache(&self) -> Option<&Arc<LocalCache>> {
        self.streaming.cache()
    }

    pub fn events(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn is_running(&self) -> bool {
        self.engine.lock().is_some() && self.handle.is_running()
    }

    /// Stop the engine and release the player. Later calls do nothing.
    pub async fn shutdown(&self) {
        let engine = self.engine.lock().take();
        if let Some(engine) = engine {
            engine.shutdown().await;
            info!("Playback service stopped");
        }
    }
}

#[async_trait]
impl PlaybackServiceHost for PlaybackService {
    async fn bind(&self) -> Result<PlaybackHandle> {
        if !self.is_running() {
            return Err(CoreError::NotConnected);
        }
        Ok(self.handle.clone())
    }
}
