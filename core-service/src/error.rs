use core_playback::{ErrorKind, PlaybackError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Not connected to the playback service")]
    NotConnected,

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotConnected => ErrorKind::Connection,
            CoreError::Playback(e) => e.kind(),
            CoreError::Runtime(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
