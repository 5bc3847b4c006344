//! Fakes shared by the service integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{
    DownloadStream, HttpClient, HttpRequest, LoadRequest, MediaPlayer, PlayerEvent,
    PlayerEventSender, PlayerStatus, SourceResolver,
};
use core_playback::error::Result;
use core_playback::{LocalCatalog, StreamingCatalog, Track, TrackLocator};
use mockall::mock;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub fn local_track(id: &str) -> Track {
    Track::new(
        id,
        format!("Song {}", id),
        "Artist",
        TrackLocator::local(format!("/music/{}.mp3", id)),
    )
}

pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(30), future)
        .await
        .expect("timed out")
}

/// Player that becomes ready and starts as soon as a source is loaded.
#[derive(Default)]
pub struct InstantPlayer {
    events: Mutex<Option<PlayerEventSender>>,
    pub loads: Mutex<Vec<LoadRequest>>,
    pub released: Mutex<bool>,
}

impl InstantPlayer {
    fn send(&self, event: PlayerEvent) {
        if let Some(tx) = self.events.lock().as_ref() {
            tx.send(event).ok();
        }
    }
}

#[async_trait]
impl MediaPlayer for InstantPlayer {
    fn attach(&self, events: PlayerEventSender, _resolver: Arc<dyn SourceResolver>) {
        *self.events.lock() = Some(events);
    }

    async fn load(&self, request: LoadRequest) -> BridgeResult<()> {
        let play = request.play_when_ready;
        self.loads.lock().push(request);
        self.send(PlayerEvent::StatusChanged(PlayerStatus::Ready));
        self.send(PlayerEvent::PlayingChanged(play));
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.send(PlayerEvent::PlayingChanged(true));
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.send(PlayerEvent::PlayingChanged(false));
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.send(PlayerEvent::PlayingChanged(false));
        Ok(())
    }

    async fn seek(&self, _position: Duration) -> BridgeResult<()> {
        Ok(())
    }

    async fn set_speed(&self, _speed: f32) -> BridgeResult<()> {
        Ok(())
    }

    async fn position(&self) -> BridgeResult<Duration> {
        Ok(Duration::ZERO)
    }

    async fn duration(&self) -> BridgeResult<Option<Duration>> {
        Ok(None)
    }

    async fn release(&self) -> BridgeResult<()> {
        *self.released.lock() = true;
        Ok(())
    }
}

pub struct OfflineHttp;

#[async_trait]
impl HttpClient for OfflineHttp {
    async fn download_stream(&self, _request: HttpRequest) -> BridgeResult<DownloadStream> {
        Err(BridgeError::NotAvailable("offline".to_string()))
    }
}

mock! {
    pub Local {}

    #[async_trait]
    impl LocalCatalog for Local {
        async fn list_local_tracks(&self) -> Result<Vec<Track>>;
    }
}

mock! {
    pub Streaming {}

    #[async_trait]
    impl StreamingCatalog for Streaming {
        async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>>;
        async fn get_trending(&self, limit: usize) -> Result<Vec<Track>>;
        async fn resolve_stream_url(&self, provider_track_id: &str) -> Result<Option<String>>;
    }
}
