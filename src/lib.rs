//! Workspace umbrella crate.
//!
//! Re-exports the playback core so host applications can depend on
//! `player-core-workspace` alone and pick platform defaults through the
//! `desktop-shims` feature.

pub use core_playback as playback;
pub use core_runtime as runtime;
pub use core_service as service;

pub use core_service::{CoreDependencies, CoreService};
