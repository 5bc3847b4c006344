//! # Host Bridge Traits
//!
//! What the playback core needs from the host app, expressed as traits the
//! host implements once per platform.
//!
//! | Trait | Used by | Desktop default |
//! |-------|---------|-----------------|
//! | [`MediaPlayer`](player::MediaPlayer) | playback engine | none, hosts wrap ExoPlayer / AVPlayer |
//! | [`SourceResolver`](player::SourceResolver) | implemented by the core, handed to the player | n/a |
//! | [`HttpClient`](http::HttpClient) | audio cache downloads | `bridge_desktop::ReqwestHttpClient` |
//! | [`FileSystemAccess`](storage::FileSystemAccess) | audio cache | `bridge_desktop::TokioFileSystem` |
//! | [`LoggerSink`](time::LoggerSink) | logging layer | none |
//! | [`Clock`](time::Clock) | cache bookkeeping | [`SystemClock`](time::SystemClock) |
//!
//! Every trait is `Send + Sync` so implementations can sit behind an `Arc`
//! shared between tasks. Failures are reported as [`BridgeError`]; keep the
//! message actionable (file path, HTTP status, player error code).

pub mod error;
pub mod http;
pub mod player;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{DownloadStream, HttpClient, HttpRequest};
pub use player::{
    AudioSource, LoadRequest, MediaMetadata, MediaPlayer, PlayerEvent, PlayerEventReceiver,
    PlayerEventSender, PlayerStatus, SessionInfo, SourceResolver,
};
pub use storage::FileSystemAccess;
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
