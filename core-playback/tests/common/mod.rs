//! Shared fakes for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{
    AudioSource, DownloadStream, HttpClient, HttpRequest, LoadRequest, MediaPlayer,
    PlayerEvent, PlayerEventSender, PlayerStatus, SessionInfo, SourceResolver,
};
use core_playback::error::Result;
use core_playback::{PlaybackPersistence, PlaybackState, StreamingCatalog, Track, TrackLocator};
use core_runtime::events::CoreEvent;
use mockall::mock;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub fn local_track(id: &str) -> Track {
    Track::new(
        id,
        format!("Song {}", id),
        "Artist",
        TrackLocator::local(format!("/music/{}.mp3", id)),
    )
    .with_duration(Duration::from_secs(180))
}

pub fn streaming_track(id: &str) -> Track {
    Track::new(id, format!("Stream {}", id), "Artist", TrackLocator::streaming("audius", id))
}

/// Poll `condition` until it holds, failing after a generous deadline.
pub async fn eventually<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(30), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Wait for the first event matching `predicate`.
pub async fn next_event<F: Fn(&CoreEvent) -> bool>(
    events: &mut broadcast::Receiver<CoreEvent>,
    predicate: F,
) -> CoreEvent {
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("event not received in time")
}

pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(30), future)
        .await
        .expect("timed out")
}

// ============================================================================
// Media player
// ============================================================================

/// In-memory player. Loads succeed immediately unless the track id is marked
/// failing; deferred sources are resolved through the attached resolver.
#[derive(Default)]
pub struct FakePlayer {
    events: Mutex<Option<PlayerEventSender>>,
    resolver: Mutex<Option<Arc<dyn SourceResolver>>>,
    failing: Mutex<HashSet<String>>,
    position: Mutex<Duration>,
    pub loads: Mutex<Vec<LoadRequest>>,
    pub calls: Mutex<Vec<String>>,
    pub resolved: Mutex<Vec<String>>,
    pub sessions: Mutex<Vec<SessionInfo>>,
}

impl FakePlayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, track_id: &str) {
        self.failing.lock().insert(track_id.to_string());
    }

    pub fn heal(&self, track_id: &str) {
        self.failing.lock().remove(track_id);
    }

    pub fn set_position(&self, position: Duration) {
        *self.position.lock() = position;
    }

    /// Simulate the current source reaching its end.
    pub fn finish(&self) {
        self.send(PlayerEvent::StatusChanged(PlayerStatus::Ended));
        self.send(PlayerEvent::PlayingChanged(false));
        self.send(PlayerEvent::Ended);
    }

    pub fn load_count(&self) -> usize {
        self.loads.lock().len()
    }

    pub fn loaded_ids(&self) -> Vec<String> {
        self.loads
            .lock()
            .iter()
            .map(|r| r.metadata.track_id.clone())
            .collect()
    }

    pub fn called(&self, name: &str) -> bool {
        self.calls.lock().iter().any(|c| c == name)
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    fn send(&self, event: PlayerEvent) {
        if let Some(tx) = self.events.lock().as_ref() {
            tx.send(event).ok();
        }
    }

    fn fail_current(&self, message: &str) {
        self.send(PlayerEvent::Error {
            code: "source".to_string(),
            message: message.to_string(),
        });
    }
}

#[async_trait]
impl MediaPlayer for FakePlayer {
    fn attach(&self, events: PlayerEventSender, resolver: Arc<dyn SourceResolver>) {
        *self.events.lock() = Some(events);
        *self.resolver.lock() = Some(resolver);
    }

    async fn load(&self, request: LoadRequest) -> BridgeResult<()> {
        self.record("load");
        self.loads.lock().push(request.clone());
        *self.position.lock() = request.start_position;

        if self.failing.lock().contains(&request.metadata.track_id) {
            self.fail_current("unplayable source");
            return Ok(());
        }

        if let AudioSource::Deferred { key } = &request.source {
            let resolver = self.resolver.lock().clone();
            let Some(resolver) = resolver else {
                return Err(BridgeError::NotAvailable("resolver".to_string()));
            };
            match resolver.resolve(key).await {
                Ok(url) => self.resolved.lock().push(url),
                Err(e) => {
                    self.fail_current(&e.to_string());
                    return Ok(());
                }
            }
        }

        self.send(PlayerEvent::StatusChanged(PlayerStatus::Buffering));
        self.send(PlayerEvent::StatusChanged(PlayerStatus::Ready));
        self.send(PlayerEvent::PlayingChanged(request.play_when_ready));
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.record("play");
        self.send(PlayerEvent::StatusChanged(PlayerStatus::Ready));
        self.send(PlayerEvent::PlayingChanged(true));
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.record("pause");
        self.send(PlayerEvent::PlayingChanged(false));
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.record("stop");
        self.send(PlayerEvent::PlayingChanged(false));
        self.send(PlayerEvent::StatusChanged(PlayerStatus::Idle));
        Ok(())
    }

    async fn seek(&self, position: Duration) -> BridgeResult<()> {
        self.record(format!("seek:{}", position.as_millis()));
        *self.position.lock() = position;
        Ok(())
    }

    async fn set_speed(&self, speed: f32) -> BridgeResult<()> {
        self.record(format!("speed:{}", speed));
        Ok(())
    }

    async fn position(&self) -> BridgeResult<Duration> {
        Ok(*self.position.lock())
    }

    async fn duration(&self) -> BridgeResult<Option<Duration>> {
        Ok(Some(Duration::from_secs(180)))
    }

    async fn publish_session(&self, session: SessionInfo) -> BridgeResult<()> {
        self.sessions.lock().push(session);
        Ok(())
    }

    async fn release(&self) -> BridgeResult<()> {
        self.record("release");
        Ok(())
    }
}

// ============================================================================
// Catalog & persistence
// ============================================================================

mock! {
    pub Catalog {}

    #[async_trait]
    impl StreamingCatalog for Catalog {
        async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>>;
        async fn get_trending(&self, limit: usize) -> Result<Vec<Track>>;
        async fn resolve_stream_url(&self, provider_track_id: &str) -> Result<Option<String>>;
    }
}

/// Catalog resolving every id to `https://cdn.test/<id>`, counting lookups.
#[derive(Default)]
pub struct CdnCatalog {
    pub lookups: AtomicUsize,
    latency: Mutex<Duration>,
}

impl CdnCatalog {
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Delay every URL lookup by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }
}

#[async_trait]
impl StreamingCatalog for CdnCatalog {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<Track>> {
        Ok(Vec::new())
    }

    async fn get_trending(&self, _limit: usize) -> Result<Vec<Track>> {
        Ok(Vec::new())
    }

    async fn resolve_stream_url(&self, provider_track_id: &str) -> Result<Option<String>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        Ok(Some(format!("https://cdn.test/{}", provider_track_id)))
    }
}

#[derive(Default)]
pub struct MemoryPersistence {
    pub now_playing: Mutex<Option<PlaybackState>>,
    pub queue: Mutex<Vec<Track>>,
}

#[async_trait]
impl PlaybackPersistence for MemoryPersistence {
    async fn save_now_playing(&self, state: &PlaybackState) -> Result<()> {
        *self.now_playing.lock() = Some(state.clone());
        Ok(())
    }

    async fn load_last_playback_state(&self) -> Result<Option<PlaybackState>> {
        Ok(self.now_playing.lock().clone())
    }

    async fn save_queue_snapshot(&self, tracks: &[Track]) -> Result<()> {
        *self.queue.lock() = tracks.to_vec();
        Ok(())
    }

    async fn load_queue_snapshot(&self) -> Result<Vec<Track>> {
        Ok(self.queue.lock().clone())
    }
}

// ============================================================================
// HTTP
// ============================================================================

/// Serves fixed bodies per URL. A declared length can be set to simulate a
/// connection dropped mid-transfer.
#[derive(Default)]
pub struct ScriptedHttp {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    declared_lengths: Mutex<HashMap<String, u64>>,
    calls: AtomicUsize,
}

impl ScriptedHttp {
    pub fn serve(&self, url: &str, body: Vec<u8>) {
        self.bodies.lock().insert(url.to_string(), body);
    }

    pub fn truncate(&self, url: &str, declared: u64) {
        self.declared_lengths.lock().insert(url.to_string(), declared);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn download_stream(&self, request: HttpRequest) -> BridgeResult<DownloadStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let body = self
            .bodies
            .lock()
            .get(&request.url)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(request.url.clone()))?;
        let declared = self
            .declared_lengths
            .lock()
            .get(&request.url)
            .copied()
            .unwrap_or(body.len() as u64);

        Ok(DownloadStream {
            content_length: Some(declared),
            reader: Box::new(Cursor::new(body)),
        })
    }
}
