//! Router error types.

use thiserror::Error;

/// Errors raised while routing a message.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Message store failure.
    #[error("store error: {0}")]
    Store(#[from] drats_store::StoreError),

    /// An email or WL2K gateway refused the message.
    #[error("gateway error: {0}")]
    Gateway(String),

    /// No viable next hop for a destination.
    #[error("no route for {0}")]
    NoRoute(String),

    /// Routes or access file could not be read.
    #[error("unable to read {path}: {source}")]
    Config {
        /// File being read.
        path: std::path::PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The router thread could not be started.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for router operations.
pub type RouterResult<T> = Result<T, RouterError>;
