//! Mode switching and debounced search.

mod common;

use async_trait::async_trait;
use common::{local_track, within, MockLocal, MockStreaming};
use core_playback::{AppMode, PlaybackError, PlaybackHandle};
use core_service::{
    CatalogController, CoreError, PlaybackServiceHost, SearchState, ServiceConnector,
};
use mockall::predicate::eq;
use std::sync::Arc;
use std::time::Duration;

const DEBOUNCE: Duration = Duration::from_millis(300);

struct NoService;

#[async_trait]
impl PlaybackServiceHost for NoService {
    async fn bind(&self) -> core_service::Result<PlaybackHandle> {
        Err(CoreError::NotConnected)
    }
}

fn controller(local: MockLocal, streaming: MockStreaming) -> CatalogController {
    let connector = Arc::new(ServiceConnector::new(Arc::new(NoService)));
    CatalogController::new(Arc::new(local), Arc::new(streaming), connector, DEBOUNCE)
}

async fn settled(controller: &CatalogController) -> SearchState {
    let mut rx = controller.subscribe_search();
    let state = within(rx.wait_for(|s| !s.is_searching)).await.unwrap().clone();
    state
}

#[tokio::test(start_paused = true)]
async fn test_load_tracks_follows_mode() {
    let mut local = MockLocal::new();
    local
        .expect_list_local_tracks()
        .times(1)
        .returning(|| Ok(vec![local_track("l1")]));
    let mut streaming = MockStreaming::new();
    streaming
        .expect_get_trending()
        .with(eq(30))
        .times(1)
        .returning(|_| Ok(vec![local_track("t1"), local_track("t2")]));
    let catalog = controller(local, streaming);

    assert_eq!(catalog.mode(), AppMode::Offline);
    assert_eq!(catalog.load_tracks().await.unwrap().len(), 1);

    catalog.set_mode(AppMode::Streaming);
    assert_eq!(*catalog.subscribe_mode().borrow(), AppMode::Streaming);
    assert_eq!(catalog.load_tracks().await.unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_rapid_queries_run_only_the_last() {
    let mut streaming = MockStreaming::new();
    streaming
        .expect_search()
        .withf(|query, limit| query == "beatles" && *limit == 50)
        .times(1)
        .returning(|_, _| Ok(vec![local_track("hey-jude")]));
    let catalog = controller(MockLocal::new(), streaming);
    catalog.set_mode(AppMode::Streaming);

    catalog.search("b");
    tokio::time::sleep(Duration::from_millis(100)).await;
    catalog.search("bea");
    tokio::time::sleep(Duration::from_millis(100)).await;
    catalog.search("  beatles ");

    assert!(catalog.search_state().is_searching);
    let state = settled(&catalog).await;

    assert_eq!(state.query, "beatles");
    assert_eq!(state.results.len(), 1);
    assert!(state.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_blank_query_clears_without_lookup() {
    let mut streaming = MockStreaming::new();
    streaming.expect_search().never();
    let catalog = controller(MockLocal::new(), streaming);
    catalog.set_mode(AppMode::Streaming);

    catalog.search("queen");
    catalog.search("   ");
    tokio::time::sleep(DEBOUNCE * 2).await;

    assert_eq!(catalog.search_state(), SearchState::default());
}

#[tokio::test(start_paused = true)]
async fn test_offline_search_filters_local_library() {
    let mut local = MockLocal::new();
    local.expect_list_local_tracks().returning(|| {
        Ok(vec![local_track("a"), local_track("b"), local_track("ab")])
    });
    let catalog = controller(local, MockStreaming::new());

    catalog.search("song a");
    let state = settled(&catalog).await;

    let ids: Vec<_> = state.results.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "ab"]);
}

#[tokio::test(start_paused = true)]
async fn test_search_failure_is_reported() {
    let mut streaming = MockStreaming::new();
    streaming
        .expect_search()
        .returning(|_, _| Err(PlaybackError::Internal("catalogue down".to_string())));
    let catalog = controller(MockLocal::new(), streaming);
    catalog.set_mode(AppMode::Streaming);

    catalog.search("queen");
    let state = settled(&catalog).await;

    assert!(state.results.is_empty());
    assert!(state.error.unwrap().contains("catalogue down"));
}

#[tokio::test(start_paused = true)]
async fn test_mode_switch_cancels_pending_search() {
    let mut streaming = MockStreaming::new();
    streaming.expect_search().never();
    let catalog = controller(MockLocal::new(), streaming);
    catalog.set_mode(AppMode::Streaming);

    catalog.search("queen");
    catalog.set_mode(AppMode::Offline);
    tokio::time::sleep(DEBOUNCE * 2).await;

    assert_eq!(catalog.search_state(), SearchState::default());
}

#[tokio::test(start_paused = true)]
async fn test_playing_without_connection_fails() {
    let catalog = controller(MockLocal::new(), MockStreaming::new());

    let result = catalog.play_from_list(vec![local_track("a")], 0).await;

    assert!(matches!(result, Err(CoreError::NotConnected)));
}
