use thiserror::Error;

/// Failure reported by a host bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The host cannot provide this capability right now (offline, no
    /// storage permission).
    #[error("Not available on this host: {0}")]
    NotAvailable(String),

    #[error("Bridge call failed: {0}")]
    OperationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Error raised by the native media player, with its own error code.
    #[error("Player error [{code}]: {message}")]
    Player { code: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
