//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided collaborators (catalogues, persistence) and
//! bridge implementations (media player, HTTP, filesystem) into the playback
//! core. Desktop hosts typically enable the `desktop-shims` feature so HTTP
//! and filesystem access fall back to `bridge-desktop`.
//!
//! ```rust,ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::{CoreDependencies, CoreService};
//!
//! let config = CoreConfig::builder()
//!     .cache_dir("/data/player/cache")
//!     .media_player(player)
//!     .build()?;
//! let core = CoreService::start(config, CoreDependencies::new(local, streaming, persistence)).await?;
//!
//! core.connector().connect().await?;
//! core.connector().play_queue(tracks, 0).await?;
//! ```

pub mod catalog;
pub mod connector;
pub mod error;
pub mod service;

pub use catalog::{CatalogController, SearchState};
pub use connector::{ConnectionState, ServiceConnector};
pub use error::{CoreError, Result};
pub use service::{MediaCommandSender, PlaybackService, PlaybackServiceHost};

use std::sync::Arc;

use core_playback::{LocalCatalog, NoopPersistence, PlaybackPersistence, StreamingCatalog};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use tracing::info;

/// Host collaborators the core consumes.
pub struct CoreDependencies {
    pub local_catalog: Arc<dyn LocalCatalog>,
    pub streaming_catalog: Arc<dyn StreamingCatalog>,
    pub persistence: Arc<dyn PlaybackPersistence>,
}

impl CoreDependencies {
    pub fn new(
        local_catalog: Arc<dyn LocalCatalog>,
        streaming_catalog: Arc<dyn StreamingCatalog>,
        persistence: Arc<dyn PlaybackPersistence>,
    ) -> Self {
        Self {
            local_catalog,
            streaming_catalog,
            persistence,
        }
    }

    /// Dependencies without playback persistence.
    pub fn without_persistence(
        local_catalog: Arc<dyn LocalCatalog>,
        streaming_catalog: Arc<dyn StreamingCatalog>,
    ) -> Self {
        Self::new(local_catalog, streaming_catalog, Arc::new(NoopPersistence))
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    service: Arc<PlaybackService>,
    connector: Arc<ServiceConnector>,
    catalog: Arc<CatalogController>,
    event_bus: EventBus,
}

impl CoreService {
    /// Start the background service and build the UI-side controllers.
    ///
    /// The connector starts disconnected; call
    /// [`ServiceConnector::connect`] before issuing intents.
    pub async fn start(config: CoreConfig, deps: CoreDependencies) -> Result<Self> {
        let event_bus = EventBus::new(config.event_buffer_size);

        let service = Arc::new(
            PlaybackService::start(
                &config,
                Arc::clone(&deps.streaming_catalog),
                deps.persistence,
                event_bus.clone(),
            )
            .await?,
        );

        let connector = Arc::new(
            ServiceConnector::new(service.clone() as Arc<dyn PlaybackServiceHost>)
                .with_event_bus(event_bus.clone()),
        );

        let catalog = Arc::new(CatalogController::new(
            deps.local_catalog,
            deps.streaming_catalog,
            Arc::clone(&connector),
            config.tuning.search_debounce,
        ));

        info!("Core service ready");
        Ok(Self {
            service,
            connector,
            catalog,
            event_bus,
        })
    }

    pub fn connector(&self) -> &Arc<ServiceConnector> {
        &self.connector
    }

    pub fn catalog(&self) -> &Arc<CatalogController> {
        &self.catalog
    }

    pub fn service(&self) -> &Arc<PlaybackService> {
        &self.service
    }

    /// Sender for OS media-session commands.
    pub fn media_commands(&self) -> MediaCommandSender {
        self.service.media_commands()
    }

    pub fn events(&self) -> &EventBus {
        &self.event_bus
    }

    /// Disconnect the UI side, stop the engine and release the player.
    pub async fn shutdown(&self) {
        self.catalog.clear_search();
        self.connector.disconnect().await;
        self.service.shutdown().await;
    }
}
