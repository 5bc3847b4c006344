//! Integration tests for logging system

use async_trait::async_trait;
use bridge_traits::error::Result as SinkResult;
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, redact_url, strip_path, LogFormat, LoggingConfig};
use core_runtime::Error;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CollectingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for CollectingSink {
    async fn log(&self, entry: LogEntry) -> SinkResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

// Global subscriber installation can only happen once per test binary, so
// everything touching it lives in this single test.
#[test]
fn test_init_logging_installs_global_subscriber() {
    let sink = Arc::new(CollectingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Info)
        .with_logger_sink(sink.clone());

    init_logging(config).expect("first initialization succeeds");

    tracing::info!(
        target: "core_playback::engine",
        track_id = "XYZ",
        url = "https://cdn.example.com/a?sig=secret",
        "Track loaded"
    );
    tracing::debug!(target: "core_playback::engine", "below the configured level");
    tracing::info!(target: "some_dependency", "not a workspace crate");

    {
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Track loaded");
        assert_eq!(entries[0].fields.get("track_id"), Some(&"XYZ".to_string()));
        assert_eq!(
            entries[0].fields.get("url"),
            Some(&"https://cdn.example.com/a?[REDACTED]".to_string())
        );
    }

    let second = init_logging(LoggingConfig::default());
    assert!(matches!(second, Err(Error::Logging(_))));
}

#[test]
fn test_invalid_filter_is_rejected_before_install() {
    let config = LoggingConfig::default().with_filter("core_playback=notalevel");
    assert!(matches!(init_logging(config), Err(Error::Logging(_))));
}

#[test]
fn test_stream_url_redaction() {
    let url = "https://rr3.example.com/videoplayback?expire=1700000000&ip=10.0.0.1&sig=AOq0";
    let redacted = redact_url(url);

    assert!(redacted.starts_with("https://rr3.example.com/videoplayback"));
    assert!(!redacted.contains("10.0.0.1"));
    assert!(!redacted.contains("sig="));
}

#[test]
fn test_path_stripping() {
    assert_eq!(
        strip_path("/data/user/0/app/cache/audio/ab12.audio"),
        "ab12.audio"
    );
    assert_eq!(strip_path("D:\\Music\\song.flac"), "song.flac");
    assert_eq!(strip_path(""), "");
}
