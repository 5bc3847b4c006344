//! Integration tests for the local audio cache, backed by a real temporary
//! directory and a scripted HTTP client.

mod common;

use bridge_desktop::TokioFileSystem;
use common::ScriptedHttp;
use core_playback::cache::{
    CacheConfig, DownloadOutcome, DownloadProgress, LocalCache, ProgressCallback,
};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    http: Arc<ScriptedHttp>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            http: Arc::new(ScriptedHttp::default()),
        }
    }

    fn config(&self) -> CacheConfig {
        CacheConfig::new(self.dir.path().join("audio")).with_max_retry_attempts(2)
    }

    async fn cache(&self, config: CacheConfig) -> LocalCache {
        let fs = Arc::new(TokioFileSystem::new());
        let cache = LocalCache::new(config, fs, self.http.clone());
        cache.initialize().await.unwrap();
        cache
    }
}

#[tokio::test]
async fn test_download_then_serve_from_disk() {
    let fixture = Fixture::new();
    fixture.http.serve("https://cdn.test/xyz", vec![7u8; 1000]);
    let cache = fixture.cache(fixture.config()).await;

    assert!(cache.cached_path("XYZ").await.is_none());

    let outcome = cache
        .download("XYZ", "https://cdn.test/xyz", None)
        .await
        .unwrap();
    let DownloadOutcome::Downloaded(entry) = outcome else {
        panic!("expected a fresh download, got {:?}", outcome);
    };
    assert_eq!(entry.size_bytes, 1000);

    let path = cache.cached_path("XYZ").await.expect("cached file");
    assert_eq!(std::fs::read(&path).unwrap(), vec![7u8; 1000]);
    assert_eq!(path.extension().unwrap(), "audio");

    let stats = cache.stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.total_bytes, 1000);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

#[tokio::test]
async fn test_second_download_does_not_fetch_again() {
    let fixture = Fixture::new();
    fixture.http.serve("https://cdn.test/xyz", vec![1u8; 64]);
    let cache = fixture.cache(fixture.config()).await;

    cache.download("XYZ", "https://cdn.test/xyz", None).await.unwrap();
    let again = cache.download("XYZ", "https://cdn.test/xyz", None).await.unwrap();

    assert!(matches!(again, DownloadOutcome::AlreadyCached(_)));
    assert_eq!(fixture.http.calls(), 1);
}

#[tokio::test]
async fn test_least_recently_used_entry_is_evicted() {
    let fixture = Fixture::new();
    for id in ["a", "b", "c"] {
        fixture.http.serve(&format!("https://cdn.test/{id}"), vec![0u8; 100]);
    }
    let cache = fixture.cache(fixture.config().with_max_size(250)).await;

    cache.download("a", "https://cdn.test/a", None).await.unwrap();
    cache.download("b", "https://cdn.test/b", None).await.unwrap();

    // Touch "a" so "b" becomes the oldest
    assert!(cache.cached_path("a").await.is_some());

    cache.download("c", "https://cdn.test/c", None).await.unwrap();

    assert!(cache.is_cached("a"));
    assert!(!cache.is_cached("b"));
    assert!(cache.is_cached("c"));
    assert_eq!(cache.stats().total_bytes, 200);
}

#[tokio::test]
async fn test_oversized_newest_entry_is_kept() {
    let fixture = Fixture::new();
    fixture.http.serve("https://cdn.test/small", vec![0u8; 50]);
    fixture.http.serve("https://cdn.test/big", vec![0u8; 500]);
    let cache = fixture.cache(fixture.config().with_max_size(100)).await;

    cache.download("small", "https://cdn.test/small", None).await.unwrap();
    cache.download("big", "https://cdn.test/big", None).await.unwrap();

    assert!(!cache.is_cached("small"));
    assert!(cache.is_cached("big"));
}

#[tokio::test]
async fn test_index_survives_restart() {
    let fixture = Fixture::new();
    fixture.http.serve("https://cdn.test/xyz", vec![3u8; 42]);

    {
        let cache = fixture.cache(fixture.config()).await;
        cache.download("XYZ", "https://cdn.test/xyz", None).await.unwrap();
    }

    let reopened = fixture.cache(fixture.config()).await;
    assert!(reopened.is_cached("XYZ"));
    assert_eq!(reopened.entry("XYZ").unwrap().size_bytes, 42);
    assert_eq!(fixture.http.calls(), 1);
}

#[tokio::test]
async fn test_missing_files_are_dropped_on_initialize() {
    let fixture = Fixture::new();
    fixture.http.serve("https://cdn.test/xyz", vec![3u8; 42]);

    let path = {
        let cache = fixture.cache(fixture.config()).await;
        cache.download("XYZ", "https://cdn.test/xyz", None).await.unwrap();
        cache.cached_path("XYZ").await.unwrap()
    };
    std::fs::remove_file(path).unwrap();

    let reopened = fixture.cache(fixture.config()).await;
    assert!(!reopened.is_cached("XYZ"));
}

#[tokio::test]
async fn test_corrupt_manifest_starts_empty() {
    let fixture = Fixture::new();
    let config = fixture.config();
    std::fs::create_dir_all(&config.cache_dir).unwrap();
    std::fs::write(config.cache_dir.join("manifest.json"), b"{ not json").unwrap();
    std::fs::write(config.cache_dir.join("leftover.part"), b"half").unwrap();

    let cache = fixture.cache(config.clone()).await;

    assert_eq!(cache.stats().entries, 0);
    assert!(!config.cache_dir.join("leftover.part").exists());
}

#[tokio::test]
async fn test_truncated_download_fails_and_leaves_nothing() {
    let fixture = Fixture::new();
    fixture.http.serve("https://cdn.test/xyz", vec![9u8; 100]);
    fixture.http.truncate("https://cdn.test/xyz", 400);

    let bus = EventBus::new(16);
    let mut events = bus.subscribe();
    let config = fixture.config();
    let cache = fixture.cache(config.clone()).await.with_event_bus(bus);

    let result = cache.download("XYZ", "https://cdn.test/xyz", None).await;

    assert!(result.is_err());
    assert_eq!(fixture.http.calls(), 2);
    assert!(!cache.is_cached("XYZ"));
    assert!(!cache.is_downloading("XYZ"));

    let leftovers: Vec<_> = std::fs::read_dir(&config.cache_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map_or(false, |ext| ext != "json"))
        .collect();
    assert!(leftovers.is_empty());

    let mut failed = false;
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Cache(CacheEvent::DownloadFailed { track_id, .. }) = event {
            assert_eq!(track_id, "XYZ");
            failed = true;
        }
    }
    assert!(failed);
}

#[tokio::test]
async fn test_progress_is_reported() {
    let fixture = Fixture::new();
    fixture.http.serve("https://cdn.test/xyz", vec![5u8; 200 * 1024]);
    let cache = fixture
        .cache(fixture.config().with_progress_interval(64 * 1024))
        .await;

    let seen: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: ProgressCallback = Arc::new(move |p: &DownloadProgress| {
        sink.lock().push(p.downloaded_bytes);
    });

    cache
        .download("XYZ", "https://cdn.test/xyz", Some(callback))
        .await
        .unwrap();

    let seen = seen.lock();
    assert!(seen.len() >= 2);
    assert_eq!(*seen.last().unwrap(), 200 * 1024);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_evict_and_clear() {
    let fixture = Fixture::new();
    fixture.http.serve("https://cdn.test/a", vec![0u8; 10]);
    fixture.http.serve("https://cdn.test/b", vec![0u8; 10]);
    let cache = fixture.cache(fixture.config()).await;

    cache.download("a", "https://cdn.test/a", None).await.unwrap();
    cache.download("b", "https://cdn.test/b", None).await.unwrap();

    assert!(cache.evict("a").await.unwrap());
    assert!(!cache.evict("a").await.unwrap());
    assert_eq!(cache.clear().await.unwrap(), 1);
    assert_eq!(cache.stats().entries, 0);
}

#[tokio::test]
async fn test_uninitialized_cache_rejects_downloads() {
    let fixture = Fixture::new();
    let fs = Arc::new(TokioFileSystem::new());
    let cache = LocalCache::new(fixture.config(), fs, fixture.http.clone());

    assert!(cache.download("XYZ", "https://cdn.test/xyz", None).await.is_err());
    assert_eq!(fixture.http.calls(), 0);
}
