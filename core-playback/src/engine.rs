//! # Playback Engine
//!
//! Single-writer actor that owns the media player and the queue.
//!
//! ## Architecture
//!
//! ```text
//!  PlaybackHandle ──PlaybackCommand──┐
//!                                    ▼
//!  MediaPlayer ───PlayerEvent───> EngineActor ──watch──> PlaybackState
//!                                    │  ▲
//!                        position ───┘  └─── retry timer
//!                        poll tick
//! ```
//!
//! Every mutation happens on the actor task. Observers only ever see whole
//! [`PlaybackState`] snapshots through a `watch` channel.
//!
//! ## Failure handling
//!
//! When the player reports an error the engine records it in the state,
//! waits `error_retry_delay` and moves to the next entry. A streak of
//! failures as long as the queue stops playback with
//! [`PlaybackEvent::QueueExhausted`]. Recovery never replays the failed entry,
//! even under repeat one.

use crate::command::PlaybackCommand;
use crate::error::{PlaybackError, Result};
use crate::queue::{AdvanceOutcome, Direction, QueueEngine, RemoveOutcome};
use crate::streaming::StreamingService;
use crate::traits::{NoopPersistence, PlaybackPersistence};
use crate::types::{PlaybackErrorInfo, PlaybackState, PlaybackStatus};
use bridge_traits::{
    LoadRequest, MediaPlayer, PlayerEvent, PlayerEventReceiver, PlayerEventSender, PlayerStatus,
    SessionInfo,
};
use core_runtime::config::PlaybackTuning;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, QueueEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

const COMMAND_BUFFER: usize = 64;

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable front end of a running engine.
#[derive(Clone)]
pub struct PlaybackHandle {
    commands: mpsc::Sender<PlaybackCommand>,
    state: watch::Receiver<PlaybackState>,
}

impl PlaybackHandle {
    /// Queue a command for the engine.
    pub async fn send(&self, command: PlaybackCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| PlaybackError::EngineStopped)
    }

    /// Queue a command without waiting for buffer space.
    pub fn try_send(&self, command: PlaybackCommand) -> Result<()> {
        self.commands
            .try_send(command)
            .map_err(|_| PlaybackError::EngineStopped)
    }

    /// Latest state snapshot.
    pub fn state(&self) -> PlaybackState {
        self.state.borrow().clone()
    }

    /// Receiver that is notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}

/// A spawned engine and the means to stop it.
pub struct RunningEngine {
    handle: PlaybackHandle,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RunningEngine {
    pub fn handle(&self) -> PlaybackHandle {
        self.handle.clone()
    }

    /// Stop the engine and wait until the player has been released.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Playback engine task ended abnormally");
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Configures and spawns the playback actor.
pub struct PlaybackEngine {
    player: Arc<dyn MediaPlayer>,
    streaming: Arc<StreamingService>,
    tuning: PlaybackTuning,
    persistence: Arc<dyn PlaybackPersistence>,
    event_bus: Option<EventBus>,
    queue: Option<QueueEngine>,
    restore_session: bool,
}

impl PlaybackEngine {
    pub fn new(
        player: Arc<dyn MediaPlayer>,
        streaming: Arc<StreamingService>,
        tuning: PlaybackTuning,
    ) -> Self {
        Self {
            player,
            streaming,
            tuning,
            persistence: Arc::new(NoopPersistence),
            event_bus: None,
            queue: None,
            restore_session: false,
        }
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn PlaybackPersistence>) -> Self {
        self.persistence = persistence;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Use a preconfigured queue, e.g. with a seeded shuffle.
    pub fn with_queue(mut self, queue: QueueEngine) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Restore the persisted queue and position when the engine starts.
    pub fn restore_session(mut self, enabled: bool) -> Self {
        self.restore_session = enabled;
        self
    }

    /// Attach the player and start the actor on the current runtime.
    pub fn spawn(self) -> RunningEngine {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (state_tx, state_rx) = watch::channel(PlaybackState::default());
        let (player_tx, player_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        self.player
            .attach(player_tx.clone(), self.streaming.source_resolver());

        let queue = self
            .queue
            .unwrap_or_else(|| QueueEngine::new(self.tuning.previous_restart_threshold));

        let actor = EngineActor {
            player: self.player,
            streaming: self.streaming,
            persistence: self.persistence,
            event_bus: self.event_bus,
            tuning: self.tuning,
            queue,
            state: PlaybackState::default(),
            state_tx,
            commands: command_rx,
            player_events: player_rx,
            _player_tx: player_tx,
            cancel: cancel.clone(),
            failure_streak: 0,
            retry_at: None,
            loaded: false,
        };

        let restore = self.restore_session;
        let task = tokio::spawn(actor.run(restore));

        RunningEngine {
            handle: PlaybackHandle {
                commands: command_tx,
                state: state_rx,
            },
            cancel,
            task,
        }
    }
}

// ============================================================================
// Actor
// ============================================================================

struct EngineActor {
    player: Arc<dyn MediaPlayer>,
    streaming: Arc<StreamingService>,
    persistence: Arc<dyn PlaybackPersistence>,
    event_bus: Option<EventBus>,
    tuning: PlaybackTuning,
    queue: QueueEngine,
    /// Working copy; published through `state_tx`.
    state: PlaybackState,
    state_tx: watch::Sender<PlaybackState>,
    commands: mpsc::Receiver<PlaybackCommand>,
    player_events: PlayerEventReceiver,
    /// Keeps the player event channel open.
    _player_tx: PlayerEventSender,
    cancel: CancellationToken,
    failure_streak: usize,
    retry_at: Option<Instant>,
    /// A source is loaded in the player.
    loaded: bool,
}

impl EngineActor {
    async fn run(mut self, restore: bool) {
        info!("Playback engine started");

        if restore {
            self.restore_session().await;
        }

        let mut ticker = interval(self.tuning.position_poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let retry_at = self.retry_at;

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },

                Some(event) = self.player_events.recv() => self.handle_player_event(event).await,

                _ = sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                    self.retry_at = None;
                    self.recover_from_error().await;
                }

                _ = ticker.tick(), if self.state.is_playing => self.poll_position().await,
            }
        }

        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        self.streaming.shutdown();

        if self.loaded {
            if let Err(e) = self.player.stop().await {
                debug!(error = %e, "Player stop failed during shutdown");
            }
        }
        if let Err(e) = self.player.release().await {
            warn!(error = %e, "Failed to release player");
        }

        self.state.is_playing = false;
        self.state.is_buffering = false;
        self.persist_now_playing().await;
        self.publish();

        info!("Playback engine stopped");
    }

    // ========================================================================
    // State publication
    // ========================================================================

    fn emit(&self, event: CoreEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(event).ok();
        }
    }

    fn sync_queue(&mut self) {
        self.state.queue = self.queue.snapshot();
        self.state.current_index = self.queue.current_index();
        self.state.current_entry = self.queue.current_entry().map(|e| e.id);
        self.state.shuffle_enabled = self.queue.shuffle_enabled();
        self.state.repeat_mode = self.queue.repeat_mode();
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }

    async fn queue_changed(&mut self) {
        self.sync_queue();
        self.publish();
        self.emit(CoreEvent::Queue(QueueEvent::Changed {
            length: self.queue.len(),
            current_index: self.queue.current_index(),
        }));

        if let Err(e) = self
            .persistence
            .save_queue_snapshot(&self.queue.tracks())
            .await
        {
            warn!(error = %e, "Failed to save queue snapshot");
        }
    }

    async fn persist_now_playing(&self) {
        if let Err(e) = self.persistence.save_now_playing(&self.state).await {
            warn!(error = %e, "Failed to save now playing");
        }
    }

    async fn publish_session(&self) {
        let session = SessionInfo {
            metadata: self.state.current_track.as_ref().map(|t| t.metadata()),
            is_playing: self.state.is_playing,
            shuffle_enabled: self.state.shuffle_enabled,
            repeat_mode: self.state.repeat_mode.as_str().to_string(),
            speed: self.state.speed,
        };

        if let Err(e) = self.player.publish_session(session).await {
            debug!(error = %e, "Failed to publish media session");
        }
    }

    fn current_track_id(&self) -> Option<String> {
        self.state.current_track.as_ref().map(|t| t.id.clone())
    }

    // ========================================================================
    // Commands
    // ========================================================================

    #[instrument(skip(self, command), fields(command = command.name()))]
    async fn handle_command(&mut self, command: PlaybackCommand) {
        debug!("Handling command");

        if command.is_navigation() {
            self.cancel_recovery();
        }

        match command {
            PlaybackCommand::Play(track) => {
                if self.queue.set_queue(vec![track], 0) {
                    self.queue_changed().await;
                    self.load_current(Duration::ZERO, true).await;
                }
            }
            PlaybackCommand::PlayQueue {
                tracks,
                start_index,
            } => {
                if self.queue.set_queue(tracks, start_index) {
                    self.queue_changed().await;
                    self.load_current(Duration::ZERO, true).await;
                } else {
                    debug!("Ignoring empty play request");
                }
            }
            PlaybackCommand::Pause => self.pause().await,
            PlaybackCommand::Resume => self.resume().await,
            PlaybackCommand::TogglePlayPause => {
                if self.state.is_playing {
                    self.pause().await;
                } else {
                    self.resume().await;
                }
            }
            PlaybackCommand::Stop => self.stop().await,
            PlaybackCommand::Next => {
                let outcome = self.queue.advance(Direction::Next, self.state.position);
                self.apply_outcome(outcome).await;
            }
            PlaybackCommand::Previous => {
                let position = self.current_position().await;
                let outcome = self.queue.advance(Direction::Previous, position);
                self.apply_outcome(outcome).await;
            }
            PlaybackCommand::SkipTo(index) => match self.queue.skip_to(index).map(|_| ()) {
                Ok(()) => {
                    self.sync_queue();
                    self.load_current(Duration::ZERO, true).await;
                }
                Err(e) => warn!(error = %e, "Skip rejected"),
            },
            PlaybackCommand::Seek(position) => self.seek(position).await,
            PlaybackCommand::SetShuffle(enabled) => {
                if self.queue.set_shuffle(enabled) {
                    self.shuffle_changed().await;
                }
            }
            PlaybackCommand::ToggleShuffle => {
                self.queue.toggle_shuffle();
                self.shuffle_changed().await;
            }
            PlaybackCommand::SetRepeat(mode) => {
                if self.queue.set_repeat_mode(mode) {
                    self.repeat_changed().await;
                }
            }
            PlaybackCommand::CycleRepeat => {
                self.queue.cycle_repeat_mode();
                self.repeat_changed().await;
            }
            PlaybackCommand::SetSpeed(speed) => self.set_speed(speed).await,
            PlaybackCommand::Append(tracks) => {
                let was_empty = self.queue.is_empty();
                if self.queue.append(tracks) > 0 {
                    self.queue_changed().await;
                    if was_empty {
                        self.load_current(Duration::ZERO, true).await;
                    }
                }
            }
            PlaybackCommand::PlayNext(tracks) => {
                let was_empty = self.queue.is_empty();
                if self.queue.play_next(tracks) > 0 {
                    self.queue_changed().await;
                    if was_empty {
                        self.load_current(Duration::ZERO, true).await;
                    }
                }
            }
            PlaybackCommand::Remove(index) => match self.queue.remove_at(index) {
                Ok(outcome) => self.handle_removal(outcome).await,
                Err(e) => warn!(error = %e, "Remove rejected"),
            },
            PlaybackCommand::Move { from, to } => match self.queue.move_entry(from, to) {
                Ok(()) => self.queue_changed().await,
                Err(e) => warn!(error = %e, "Move rejected"),
            },
            PlaybackCommand::ClearQueue => {
                self.queue.clear();
                self.stop_player().await;
                self.state.current_track = None;
                self.state.duration = None;
                self.state.position = Duration::ZERO;
                self.state.status = PlaybackStatus::Idle;
                self.state.error = None;
                self.queue_changed().await;
            }
        }
    }

    async fn apply_outcome(&mut self, outcome: AdvanceOutcome) {
        match outcome {
            AdvanceOutcome::Moved(_) => {
                self.sync_queue();
                self.load_current(Duration::ZERO, true).await;
            }
            AdvanceOutcome::Restart(_) => self.restart_current().await,
            AdvanceOutcome::EndOfQueue => self.end_of_queue().await,
        }
    }

    async fn handle_removal(&mut self, outcome: RemoveOutcome) {
        match outcome {
            RemoveOutcome::Removed => self.queue_changed().await,
            RemoveOutcome::CurrentRemoved { next: Some(_) } => {
                self.cancel_recovery();
                let autoplay =
                    self.state.is_playing || self.state.status == PlaybackStatus::Error;
                self.queue_changed().await;
                self.load_current(Duration::ZERO, autoplay).await;
            }
            RemoveOutcome::CurrentRemoved { next: None } => {
                self.cancel_recovery();
                self.stop_player().await;
                if self.queue.is_empty() {
                    self.state.current_track = None;
                    self.state.duration = None;
                    self.state.status = PlaybackStatus::Idle;
                } else {
                    self.state.current_track = self.queue.current_track().cloned();
                    self.state.duration = None;
                    self.state.status = PlaybackStatus::Ended;
                }
                self.state.position = Duration::ZERO;
                self.queue_changed().await;
            }
        }
    }

    async fn shuffle_changed(&mut self) {
        self.emit(CoreEvent::Queue(QueueEvent::ShuffleChanged {
            enabled: self.queue.shuffle_enabled(),
        }));
        self.queue_changed().await;
        self.publish_session().await;
    }

    async fn repeat_changed(&mut self) {
        self.emit(CoreEvent::Queue(QueueEvent::RepeatChanged {
            mode: self.queue.repeat_mode().as_str().to_string(),
        }));
        self.queue_changed().await;
        self.publish_session().await;
    }

    // ========================================================================
    // Player control
    // ========================================================================

    /// Load the current queue entry into the player.
    async fn load_current(&mut self, start: Duration, autoplay: bool) {
        let Some(entry) = self.queue.current_entry().cloned() else {
            return;
        };
        let index = self.queue.current_index().unwrap_or(0);

        let prepared = self.streaming.prepare(&entry.track).await;
        let mut request =
            LoadRequest::new(prepared.source, prepared.track.metadata()).start_at(start);
        if !autoplay {
            request = request.paused();
        }

        self.sync_queue();
        self.state.current_track = Some(prepared.track.clone());
        self.state.status = PlaybackStatus::Loading;
        self.state.is_buffering = true;
        self.state.is_playing = false;
        self.state.position = start;
        self.state.duration = prepared.track.duration;
        self.state.error = None;
        self.publish();

        info!(
            track_id = %entry.track.id,
            index,
            from_cache = prepared.from_cache,
            "Loading track"
        );

        match self.player.load(request).await {
            Ok(()) => {
                self.loaded = true;
                self.emit(CoreEvent::Playback(PlaybackEvent::TrackChanged {
                    track_id: entry.track.id.clone(),
                    title: entry.track.title.clone(),
                    index,
                }));
                self.persist_now_playing().await;
                self.publish_session().await;
            }
            Err(e) => {
                let error = PlaybackError::from(e);
                self.handle_failure(error.code().to_string(), error.to_string())
                    .await;
            }
        }
    }

    async fn restart_current(&mut self) {
        if !self.loaded || self.state.status == PlaybackStatus::Error {
            self.load_current(Duration::ZERO, true).await;
            return;
        }

        self.seek(Duration::ZERO).await;
        if !self.state.is_playing {
            if let Err(e) = self.player.play().await {
                warn!(error = %e, "Failed to restart playback");
            }
        }
    }

    async fn pause(&mut self) {
        if !self.loaded {
            return;
        }

        match self.player.pause().await {
            Ok(()) => {
                self.state.position = self.current_position().await;
                self.set_playing(false).await;
            }
            Err(e) => warn!(error = %e, "Failed to pause"),
        }
    }

    async fn resume(&mut self) {
        if !self.loaded || self.state.status == PlaybackStatus::Error {
            // Restored sessions and failed tracks need a fresh load
            if self.queue.current_entry().is_some() {
                let start = if self.state.status == PlaybackStatus::Ended {
                    Duration::ZERO
                } else {
                    self.state.position
                };
                self.load_current(start, true).await;
            }
            return;
        }

        if self.state.status == PlaybackStatus::Ended {
            self.seek(Duration::ZERO).await;
        }

        if let Err(e) = self.player.play().await {
            warn!(error = %e, "Failed to resume");
        }
    }

    async fn stop(&mut self) {
        self.stop_player().await;
        self.state.position = Duration::ZERO;
        self.state.status = PlaybackStatus::Idle;
        self.publish();
        self.emit(CoreEvent::Playback(PlaybackEvent::Stopped {
            track_id: self.current_track_id(),
        }));
        self.persist_now_playing().await;
        self.publish_session().await;
    }

    async fn stop_player(&mut self) {
        if self.loaded {
            if let Err(e) = self.player.stop().await {
                warn!(error = %e, "Failed to stop player");
            }
        }
        self.loaded = false;
        self.retry_at = None;
        self.state.is_playing = false;
        self.state.is_buffering = false;
    }

    async fn seek(&mut self, position: Duration) {
        if !self.loaded {
            self.state.position = position;
            self.publish();
            return;
        }

        let position = match self.state.duration {
            Some(duration) => position.min(duration),
            None => position,
        };

        match self.player.seek(position).await {
            Ok(()) => {
                self.state.position = position;
                self.publish();
            }
            Err(e) => warn!(error = %e, "Seek failed"),
        }
    }

    async fn set_speed(&mut self, speed: f32) {
        if !self.tuning.accepts_speed(speed) {
            warn!(error = %PlaybackError::InvalidSpeed(speed), "Speed rejected");
            return;
        }

        match self.player.set_speed(speed).await {
            Ok(()) => {
                self.state.speed = speed;
                self.publish();
                self.publish_session().await;
            }
            Err(e) => warn!(error = %e, "Failed to set speed"),
        }
    }

    async fn current_position(&self) -> Duration {
        if !self.loaded {
            return self.state.position;
        }

        self.player
            .position()
            .await
            .unwrap_or(self.state.position)
    }

    async fn poll_position(&mut self) {
        let Ok(position) = self.player.position().await else {
            return;
        };

        if position != self.state.position {
            self.state.position = position;
            self.publish();
        }
    }

    async fn end_of_queue(&mut self) {
        debug!("End of queue reached");

        if self.loaded {
            if let Err(e) = self.player.pause().await {
                debug!(error = %e, "Pause at end of queue failed");
            }
        }

        self.state.is_playing = false;
        self.state.is_buffering = false;
        self.state.status = PlaybackStatus::Ended;
        self.publish();
        self.emit(CoreEvent::Playback(PlaybackEvent::Stopped {
            track_id: self.current_track_id(),
        }));
        self.publish_session().await;
    }

    async fn set_playing(&mut self, playing: bool) {
        if self.state.is_playing == playing {
            return;
        }

        self.state.is_playing = playing;
        if !self.state.is_buffering {
            self.state.status = if playing {
                PlaybackStatus::Playing
            } else {
                PlaybackStatus::Paused
            };
        }
        self.publish();

        if let Some(track_id) = self.current_track_id() {
            let position_ms = millis(self.state.position);
            let event = if playing {
                PlaybackEvent::Started {
                    track_id,
                    position_ms,
                }
            } else {
                PlaybackEvent::Paused {
                    track_id,
                    position_ms,
                }
            };
            self.emit(CoreEvent::Playback(event));
        }

        self.publish_session().await;
    }

    // ========================================================================
    // Player events
    // ========================================================================

    async fn handle_player_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::StatusChanged(status) => self.handle_status(status).await,
            PlayerEvent::PlayingChanged(playing) => {
                if playing {
                    self.failure_streak = 0;
                    self.state.error = None;
                }
                self.set_playing(playing).await;
            }
            PlayerEvent::Error { code, message } => self.handle_failure(code, message).await,
            PlayerEvent::Ended => self.handle_ended().await,
        }
    }

    async fn handle_status(&mut self, status: PlayerStatus) {
        match status {
            PlayerStatus::Idle => {
                self.state.is_buffering = false;
                if self.state.status != PlaybackStatus::Error {
                    self.state.status = PlaybackStatus::Idle;
                }
            }
            PlayerStatus::Buffering => {
                self.state.is_buffering = true;
                self.state.status = PlaybackStatus::Buffering;
            }
            PlayerStatus::Ready => {
                self.state.is_buffering = false;
                self.state.status = if self.state.is_playing {
                    PlaybackStatus::Playing
                } else {
                    PlaybackStatus::Paused
                };
                if let Ok(Some(duration)) = self.player.duration().await {
                    self.state.duration = Some(duration);
                }
            }
            PlayerStatus::Ended => {
                self.state.is_buffering = false;
                self.state.status = PlaybackStatus::Ended;
            }
        }
        self.publish();
    }

    async fn handle_ended(&mut self) {
        if let Some(track_id) = self.current_track_id() {
            self.emit(CoreEvent::Playback(PlaybackEvent::Completed { track_id }));
        }

        self.state.is_playing = false;
        let outcome = self.queue.advance(Direction::Next, Duration::ZERO);
        debug!(?outcome, repeat = ?self.queue.repeat_mode(), "Track ended");

        match outcome {
            AdvanceOutcome::Moved(_) => {
                self.sync_queue();
                self.load_current(Duration::ZERO, true).await;
            }
            AdvanceOutcome::Restart(_) => {
                self.seek(Duration::ZERO).await;
                if let Err(e) = self.player.play().await {
                    warn!(error = %e, "Failed to replay track");
                }
            }
            AdvanceOutcome::EndOfQueue => {
                if let Some(duration) = self.state.duration {
                    self.state.position = duration;
                }
                self.end_of_queue().await;
                self.persist_now_playing().await;
            }
        }
    }

    /// Record a failure of the current track and schedule recovery.
    async fn handle_failure(&mut self, code: String, message: String) {
        warn!(code = %code, message = %message, "Playback error");

        if let Some(track) = &self.state.current_track {
            self.streaming.invalidate(track);
        }

        self.failure_streak += 1;
        let recoverable = self.failure_streak < self.queue.len();

        self.state.error = Some(PlaybackErrorInfo {
            code: code.clone(),
            message: message.clone(),
        });
        self.state.status = PlaybackStatus::Error;
        self.state.is_playing = false;
        self.state.is_buffering = false;
        self.publish();

        self.emit(CoreEvent::Playback(PlaybackEvent::Error {
            track_id: self.current_track_id(),
            code,
            message,
            recoverable,
        }));

        if recoverable {
            self.retry_at = Some(Instant::now() + self.tuning.error_retry_delay);
        } else {
            self.queue_exhausted().await;
        }
    }

    /// Forget a pending skip. Recovery only ever applies to the track that
    /// failed, not to one the user picked since.
    fn cancel_recovery(&mut self) {
        self.failure_streak = 0;
        self.retry_at = None;
    }

    async fn recover_from_error(&mut self) {
        match self.queue.skip_forward() {
            Some(index) => {
                debug!(index, streak = self.failure_streak, "Skipping failed track");
                self.sync_queue();
                self.load_current(Duration::ZERO, true).await;
            }
            None => self.queue_exhausted().await,
        }
    }

    async fn queue_exhausted(&mut self) {
        let failures = self.failure_streak;
        warn!(failures, "No playable track left, stopping");

        self.stop_player().await;
        self.failure_streak = 0;
        self.publish();

        self.emit(CoreEvent::Playback(PlaybackEvent::QueueExhausted { failures }));
        self.emit(CoreEvent::Playback(PlaybackEvent::Stopped {
            track_id: self.current_track_id(),
        }));
        self.publish_session().await;
    }

    // ========================================================================
    // Session restore
    // ========================================================================

    async fn restore_session(&mut self) {
        let tracks = match self.persistence.load_queue_snapshot().await {
            Ok(tracks) => tracks,
            Err(e) => {
                warn!(error = %e, "Failed to load queue snapshot");
                return;
            }
        };

        let last = match self.persistence.load_last_playback_state().await {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Failed to load last playback state");
                PlaybackState::default()
            }
        };

        let index = last.current_index.unwrap_or(0);
        if !self
            .queue
            .restore(tracks, index, last.repeat_mode, last.shuffle_enabled)
        {
            debug!("No session to restore");
            return;
        }

        if self.tuning.accepts_speed(last.speed) && last.speed != 1.0 {
            self.set_speed(last.speed).await;
        }

        info!(
            len = self.queue.len(),
            index,
            position_ms = millis(last.position),
            "Restoring last session"
        );
        self.sync_queue();
        self.load_current(last.position, false).await;
    }
}
