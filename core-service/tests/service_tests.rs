//! End-to-end tests through the `CoreService` façade.

mod common;

use bridge_desktop::TokioFileSystem;
use common::{local_track, within, InstantPlayer, MockLocal, MockStreaming, OfflineHttp};
use core_playback::{MediaCommand, PlaybackStatus};
use core_runtime::config::CoreConfig;
use core_runtime::events::{ConnectionEvent, CoreEvent};
use core_service::{ConnectionState, CoreDependencies, CoreError, CoreService};
use std::sync::Arc;
use tempfile::TempDir;

struct Setup {
    _dir: TempDir,
    player: Arc<InstantPlayer>,
    core: CoreService,
}

async fn start() -> Setup {
    let dir = tempfile::tempdir().unwrap();
    let player = Arc::new(InstantPlayer::default());

    let config = CoreConfig::builder()
        .cache_dir(dir.path().join("cache"))
        .media_player(player.clone())
        .http_client(Arc::new(OfflineHttp))
        .file_system(Arc::new(TokioFileSystem::new()))
        .restore_session(false)
        .build()
        .unwrap();

    let deps = CoreDependencies::without_persistence(
        Arc::new(MockLocal::new()),
        Arc::new(MockStreaming::new()),
    );
    let core = CoreService::start(config, deps).await.unwrap();

    Setup {
        _dir: dir,
        player,
        core,
    }
}

#[tokio::test]
async fn test_intents_before_connect_are_dropped() {
    let s = start().await;
    let mut events = s.core.events().subscribe();

    let result = s.core.connector().play(local_track("a")).await;

    assert!(matches!(result, Err(CoreError::NotConnected)));
    assert!(s.player.loads.lock().is_empty());
    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::Connection(ConnectionEvent::CommandDropped {
            command: "play".to_string()
        })
    );
}

#[tokio::test]
async fn test_connected_intents_reach_the_engine() {
    let s = start().await;
    let connector = s.core.connector();

    connector.connect().await.unwrap();
    connector.connect().await.unwrap();
    assert_eq!(connector.connection_state(), ConnectionState::Connected);

    connector
        .play_queue(vec![local_track("a"), local_track("b")], 1)
        .await
        .unwrap();

    let mut state = connector.subscribe_state();
    let snapshot = within(state.wait_for(|s| s.is_playing))
        .await
        .unwrap()
        .clone();
    assert_eq!(snapshot.current_track_id(), Some("b"));
    assert_eq!(snapshot.queue_len(), 2);
    assert_eq!(s.player.loads.lock().len(), 1);
}

#[tokio::test]
async fn test_mirrored_state_survives_disconnect() {
    let s = start().await;
    let connector = s.core.connector();
    connector.connect().await.unwrap();
    connector.play(local_track("a")).await.unwrap();

    let mut state = connector.subscribe_state();
    within(state.wait_for(|s| s.is_playing)).await.unwrap();

    connector.disconnect().await;
    connector.disconnect().await;

    assert_eq!(connector.connection_state(), ConnectionState::Disconnected);
    assert_eq!(connector.state().current_track_id(), Some("a"));
    assert!(connector.pause().await.is_err());

    connector.connect().await.unwrap();
    connector.pause().await.unwrap();
    within(state.wait_for(|s| s.status == PlaybackStatus::Paused))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_media_commands_share_intent_semantics() {
    let s = start().await;
    let connector = s.core.connector();
    connector.connect().await.unwrap();
    connector
        .play_queue(vec![local_track("a"), local_track("b"), local_track("c")], 0)
        .await
        .unwrap();

    let mut state = connector.subscribe_state();
    within(state.wait_for(|s| s.is_playing)).await.unwrap();

    let media = s.core.media_commands();
    media.send(MediaCommand::SkipNext).unwrap();
    media.send(MediaCommand::ToggleShuffle).unwrap();

    let snapshot = within(state.wait_for(|s| s.shuffle_enabled))
        .await
        .unwrap()
        .clone();
    assert_eq!(snapshot.current_track_id(), Some("b"));
    assert_eq!(snapshot.current_index, Some(0));
}

#[tokio::test]
async fn test_shutdown_disconnects_and_releases_player() {
    let s = start().await;
    let connector = s.core.connector();
    connector.connect().await.unwrap();

    s.core.shutdown().await;

    assert_eq!(connector.connection_state(), ConnectionState::Disconnected);
    assert!(*s.player.released.lock());
    assert!(!s.core.service().is_running());
    assert!(connector.connect().await.is_err());
    assert!(s.core.media_commands().send(MediaCommand::Play).is_err());
}

#[tokio::test]
async fn test_album_playback_tags_tracks() {
    let s = start().await;
    s.core.connector().connect().await.unwrap();

    s.core
        .catalog()
        .play_album(&[local_track("a"), local_track("b")], "Live at Leeds", 0)
        .await
        .unwrap();

    let mut state = s.core.connector().subscribe_state();
    let snapshot = within(state.wait_for(|s| s.is_playing))
        .await
        .unwrap()
        .clone();
    assert!(snapshot
        .queue
        .iter()
        .all(|e| e.track.album.as_deref() == Some("Live at Leeds")));
    assert_eq!(
        s.player.loads.lock()[0].metadata.album.as_deref(),
        Some("Live at Leeds")
    );
}
