//! Catalogue browsing and search for the UI.
//!
//! The [`AppMode`] decides which catalogue backs listing and search:
//! local files when offline, the streaming provider otherwise.

use crate::connector::ServiceConnector;
use crate::error::Result;
use core_playback::{AppMode, LocalCatalog, StreamingCatalog, Track};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

const DEFAULT_SEARCH_LIMIT: usize = 50;
const DEFAULT_TRENDING_LIMIT: usize = 30;

/// Observable state of the search box.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub query: String,
    pub results: Vec<Track>,
    pub is_searching: bool,
    pub error: Option<String>,
}

struct ActiveSearch {
    generation: u64,
    cancel: CancellationToken,
}

pub struct CatalogController {
    local: Arc<dyn LocalCatalog>,
    streaming: Arc<dyn StreamingCatalog>,
    connector: Arc<ServiceConnector>,
    mode: watch::Sender<AppMode>,
    search: Arc<watch::Sender<SearchState>>,
    active_search: Arc<Mutex<Option<ActiveSearch>>>,
    generation: Mutex<u64>,
    debounce: Duration,
    search_limit: usize,
    trending_limit: usize,
}

impl CatalogController {
    pub fn new(
        local: Arc<dyn LocalCatalog>,
        streaming: Arc<dyn StreamingCatalog>,
        connector: Arc<ServiceConnector>,
        debounce: Duration,
    ) -> Self {
        let (mode, _) = watch::channel(AppMode::default());
        let (search, _) = watch::channel(SearchState::default());

        Self {
            local,
            streaming,
            connector,
            mode,
            search: Arc::new(search),
            active_search: Arc::new(Mutex::new(None)),
            generation: Mutex::new(0),
            debounce,
            search_limit: DEFAULT_SEARCH_LIMIT,
            trending_limit: DEFAULT_TRENDING_LIMIT,
        }
    }

    pub fn with_limits(mut self, search_limit: usize, trending_limit: usize) -> Self {
        self.search_limit = search_limit;
        self.trending_limit = trending_limit;
        self
    }

    // ========================================================================
    // Mode
    // ========================================================================

    pub fn mode(&self) -> AppMode {
        *self.mode.borrow()
    }

    pub fn subscribe_mode(&self) -> watch::Receiver<AppMode> {
        self.mode.subscribe()
    }

    /// Switch catalogues. Pending searches are cancelled and results cleared.
    pub fn set_mode(&self, mode: AppMode) {
        let changed = self.mode.send_if_modified(|current| {
            if *current == mode {
                return false;
            }
            *current = mode;
            true
        });

        if changed {
            debug!(?mode, "App mode changed");
            self.clear_search();
        }
    }

    /// Tracks for the browse screen: the local library offline, trending
    /// tracks when streaming.
    #[instrument(skip(self))]
    pub async fn load_tracks(&self) -> Result<Vec<Track>> {
        let tracks = match self.mode() {
            AppMode::Offline => self.local.list_local_tracks().await?,
            AppMode::Streaming => self.streaming.get_trending(self.trending_limit).await?,
        };
        debug!(count = tracks.len(), "Loaded tracks");
        Ok(tracks)
    }

    // ========================================================================
    // Search
    // ========================================================================

    pub fn search_state(&self) -> SearchState {
        self.search.borrow().clone()
    }

    pub fn subscribe_search(&self) -> watch::Receiver<SearchState> {
        self.search.subscribe()
    }

    /// Start a debounced search.
    ///
    /// Any search still waiting or running is cancelled; only the latest
    /// query publishes results. A blank query clears the results without a
    /// catalogue call.
    pub fn search(&self, query: &str) {
        let query = query.trim().to_string();
        if query.is_empty() {
            self.clear_search();
            return;
        }

        let generation = {
            let mut generation = self.generation.lock();
            *generation += 1;
            *generation
        };

        let cancel = CancellationToken::new();
        if let Some(previous) = self.active_search.lock().replace(ActiveSearch {
            generation,
            cancel: cancel.clone(),
        }) {
            previous.cancel.cancel();
        }

        self.search.send_modify(|state| {
            state.query = query.clone();
            state.is_searching = true;
            state.error = None;
        });

        let mode = self.mode();
        let local = Arc::clone(&self.local);
        let streaming = Arc::clone(&self.streaming);
        let search = Arc::clone(&self.search);
        let active = Arc::clone(&self.active_search);
        let debounce = self.debounce;
        let limit = self.search_limit;

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(debounce) => {}
            }

            let lookup = async {
                match mode {
                    AppMode::Streaming => streaming.search(&query, limit).await,
                    AppMode::Offline => local
                        .list_local_tracks()
                        .await
                        .map(|tracks| filter_local(tracks, &query, limit)),
                }
            };

            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                result = lookup => result,
            };

            {
                let mut active = active.lock();
                match active.as_ref() {
                    Some(current) if current.generation == generation => *active = None,
                    _ => return,
                }
            }

            match result {
                Ok(results) => {
                    debug!(count = results.len(), "Search finished");
                    search.send_replace(SearchState {
                        query,
                        results,
                        is_searching: false,
                        error: None,
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Search failed");
                    search.send_modify(|state| {
                        state.is_searching = false;
                        state.error = Some(e.to_string());
                    });
                }
            }
        });
    }

    /// Cancel any pending search and clear results.
    pub fn clear_search(&self) {
        if let Some(previous) = self.active_search.lock().take() {
            previous.cancel.cancel();
        }
        self.search.send_replace(SearchState::default());
    }

    // ========================================================================
    // Playback shortcuts
    // ========================================================================

    /// Play `tracks` as the new queue, starting at `index`.
    pub async fn play_from_list(&self, tracks: Vec<Track>, index: usize) -> Result<()> {
        self.connector.play_queue(tracks, index).await
    }

    /// Play an album, tagging every track with the album name.
    pub async fn play_album(&self, tracks: &[Track], album: &str, index: usize) -> Result<()> {
        let tracks = tracks.iter().map(|t| t.with_album(album)).collect();
        self.connector.play_queue(tracks, index).await
    }
}

impl Drop for CatalogController {
    fn drop(&mut self) {
        if let Some(active) = self.active_search.lock().take() {
            active.cancel.cancel();
        }
    }
}

fn filter_local(tracks: Vec<Track>, query: &str, limit: usize) -> Vec<Track> {
    let needle = query.to_lowercase();
    tracks
        .into_iter()
        .filter(|t| {
            t.title.to_lowercase().contains(&needle)
                || t.artist.to_lowercase().contains(&needle)
                || t.album
                    .as_deref()
                    .map_or(false, |a| a.to_lowercase().contains(&needle))
        })
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_playback::TrackLocator;

    fn track(id: &str, title: &str, artist: &str) -> Track {
        Track::new(id, title, artist, TrackLocator::local(format!("/music/{}.mp3", id)))
    }

    #[test]
    fn test_filter_local_matches_title_artist_and_album() {
        let tracks = vec![
            track("1", "Blue Monday", "New Order"),
            track("2", "Teardrop", "Massive Attack"),
            track("3", "Angel", "Other").with_album("Mezzanine"),
        ];

        let ids = |found: Vec<Track>| found.into_iter().map(|t| t.id).collect::<Vec<_>>();

        assert_eq!(ids(filter_local(tracks.clone(), "blue", 10)), vec!["1"]);
        assert_eq!(ids(filter_local(tracks.clone(), "ATTACK", 10)), vec!["2"]);
        assert_eq!(ids(filter_local(tracks.clone(), "mezz", 10)), vec!["3"]);
        assert_eq!(filter_local(tracks, "e", 2).len(), 2);
    }
}
