//! # Service Connector
//!
//! UI-side view of the background [`PlaybackService`](crate::PlaybackService).
//!
//! ## Lifecycle
//!
//! ```text
//!   Disconnected ──connect()──> Connecting ──bind ok──> Connected
//!        ▲                          │                      │
//!        └────────bind failed───────┘                      │
//!        └──────────disconnect() / service gone────────────┘
//! ```
//!
//! `connect()` and `disconnect()` are idempotent. While not connected every
//! intent is dropped: it returns [`CoreError::NotConnected`] and is reported
//! as [`ConnectionEvent::CommandDropped`]. The UI is expected to retry once
//! [`ConnectionState::Connected`] is observed.
//!
//! While connected a mirror task copies every engine [`PlaybackState`] into a
//! local `watch` channel, so observers keep the last snapshot across
//! reconnects.

use crate::error::{CoreError, Result};
use crate::service::PlaybackServiceHost;
use core_playback::{PlaybackCommand, PlaybackHandle, PlaybackState, RepeatMode, Track};
use core_runtime::events::{ConnectionEvent, CoreEvent, EventBus};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

struct Binding {
    handle: PlaybackHandle,
    cancel: CancellationToken,
}

pub struct ServiceConnector {
    host: Arc<dyn PlaybackServiceHost>,
    event_bus: Option<EventBus>,
    connection: Arc<watch::Sender<ConnectionState>>,
    state: Arc<watch::Sender<PlaybackState>>,
    binding: Arc<Mutex<Option<Binding>>>,
    /// Serializes connect and disconnect.
    lifecycle: tokio::sync::Mutex<()>,
}

impl ServiceConnector {
    pub fn new(host: Arc<dyn PlaybackServiceHost>) -> Self {
        let (connection, _) = watch::channel(ConnectionState::Disconnected);
        let (state, _) = watch::channel(PlaybackState::default());

        Self {
            host,
            event_bus: None,
            connection: Arc::new(connection),
            state: Arc::new(state),
            binding: Arc::new(Mutex::new(None)),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Bind to the service. Does nothing when already connected.
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        if self.binding.lock().is_some() {
            debug!("Already connected");
            return Ok(());
        }

        self.set_connection(ConnectionState::Connecting);
        self.emit(ConnectionEvent::Connecting);

        let handle = match self.host.bind().await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "Failed to bind playback service");
                self.set_connection(ConnectionState::Disconnected);
                self.emit(ConnectionEvent::Disconnected);
                return Err(e);
            }
        };

        let cancel = CancellationToken::new();
        self.spawn_mirror(handle.subscribe(), cancel.clone());
        *self.binding.lock() = Some(Binding { handle, cancel });

        self.set_connection(ConnectionState::Connected);
        self.emit(ConnectionEvent::Connected);
        info!("Connected to playback service");
        Ok(())
    }

    /// Unbind from the service. Does nothing when not connected.
    pub async fn disconnect(&self) {
        let _guard = self.lifecycle.lock().await;
        let Some(binding) = self.binding.lock().take() else {
            return;
        };

        binding.cancel.cancel();
        self.set_connection(ConnectionState::Disconnected);
        self.emit(ConnectionEvent::Disconnected);
        info!("Disconnected from playback service");
    }

    fn spawn_mirror(&self, mut engine_state: watch::Receiver<PlaybackState>, cancel: CancellationToken) {
        let state = Arc::clone(&self.state);
        let connection = Arc::clone(&self.connection);
        let binding = Arc::clone(&self.binding);
        let event_bus = self.event_bus.clone();

        state.send_replace(engine_state.borrow_and_update().clone());

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = engine_state.changed() => {
                        if changed.is_err() {
                            warn!("Playback service went away");
                            binding.lock().take();
                            connection.send_replace(ConnectionState::Disconnected);
                            if let Some(bus) = &event_bus {
                                bus.emit(CoreEvent::Connection(ConnectionEvent::Disconnected)).ok();
                            }
                            break;
                        }
                        let snapshot = engine_state.borrow_and_update().clone();
                        state.send_replace(snapshot);
                    }
                }
            }
        });
    }

    // ========================================================================
    // Observation
    // ========================================================================

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Last mirrored playback state.
    pub fn state(&self) -> PlaybackState {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.state.subscribe()
    }

    // ========================================================================
    // Intents
    // ========================================================================

    /// Forward a command to the engine.
    pub async fn send(&self, command: PlaybackCommand) -> Result<()> {
        let handle = self.binding.lock().as_ref().map(|b| b.handle.clone());
        let Some(handle) = handle else {
            return Err(self.drop_command(&command));
        };

        let name = command.name();
        handle.send(command).await.map_err(|_| {
            warn!(command = name, "Playback service stopped, dropping command");
            self.emit(ConnectionEvent::CommandDropped {
                command: name.to_string(),
            });
            CoreError::NotConnected
        })
    }

    fn drop_command(&self, command: &PlaybackCommand) -> CoreError {
        debug!(command = command.name(), state = ?self.connection_state(), "Not connected, dropping command");
        self.emit(ConnectionEvent::CommandDropped {
            command: command.name().to_string(),
        });
        CoreError::NotConnected
    }

    pub async fn play(&self, track: Track) -> Result<()> {
        self.send(PlaybackCommand::Play(track)).await
    }

    pub async fn play_queue(&self, tracks: Vec<Track>, start_index: usize) -> Result<()> {
        self.send(PlaybackCommand::PlayQueue {
            tracks,
            start_index,
        })
        .await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(PlaybackCommand::Pause).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.send(PlaybackCommand::Resume).await
    }

    pub async fn toggle_play_pause(&self) -> Result<()> {
        self.send(PlaybackCommand::TogglePlayPause).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(PlaybackCommand::Stop).await
    }

    pub async fn skip_next(&self) -> Result<()> {
        self.send(PlaybackCommand::Next).await
    }

    pub async fn skip_previous(&self) -> Result<()> {
        self.send(PlaybackCommand::Previous).await
    }

    pub async fn skip_to(&self, index: usize) -> Result<()> {
        self.send(PlaybackCommand::SkipTo(index)).await
    }

    pub async fn seek(&self, position: Duration) -> Result<()> {
        self.send(PlaybackCommand::Seek(position)).await
    }

    pub async fn set_shuffle(&self, enabled: bool) -> Result<()> {
        self.send(PlaybackCommand::SetShuffle(enabled)).await
    }

    pub async fn toggle_shuffle(&self) -> Result<()> {
        self.send(PlaybackCommand::ToggleShuffle).await
    }

    pub async fn set_repeat(&self, mode: RepeatMode) -> Result<()> {
        self.send(PlaybackCommand::SetRepeat(mode)).await
    }

    pub async fn cycle_repeat(&self) -> Result<()> {
        self.send(PlaybackCommand::CycleRepeat).await
    }

    pub async fn set_speed(&self, speed: f32) -> Result<()> {
        self.send(PlaybackCommand::SetSpeed(speed)).await
    }

    pub async fn add_to_queue(&self, tracks: Vec<Track>) -> Result<()> {
        self.send(PlaybackCommand::Append(tracks)).await
    }

    pub async fn play_next(&self, tracks: Vec<Track>) -> Result<()> {
        self.send(PlaybackCommand::PlayNext(tracks)).await
    }

    pub async fn remove_from_queue(&self, index: usize) -> Result<()> {
        self.send(PlaybackCommand::Remove(index)).await
    }

    pub async fn move_in_queue(&self, from: usize, to: usize) -> Result<()> {
        self.send(PlaybackCommand::Move { from, to }).await
    }

    pub async fn clear_queue(&self) -> Result<()> {
        self.send(PlaybackCommand::ClearQueue).await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn set_connection(&self, state: ConnectionState) {
        self.connection.send_replace(state);
    }

    fn emit(&self, event: ConnectionEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Connection(event)).ok();
        }
    }
}

impl Drop for ServiceConnector {
    fn drop(&mut self) {
        if let Some(binding) = self.binding.lock().take() {
            binding.cancel.cancel();
        }
    }
}
