//! # Core Runtime
//!
//! Shared plumbing for the playback crates: [`config::CoreConfig`] with
//! its fail-fast builder, the [`events::EventBus`] every engine publishes
//! on, and the `tracing` bootstrap in [`logging`].

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
