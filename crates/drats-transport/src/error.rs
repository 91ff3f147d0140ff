//! Data path error types.

use drats_agw::AgwError;
use thiserror::Error;

/// Errors raised by data paths.
///
/// `NotConnected` means the transport could not be established; `Io` means an
/// established transport failed mid-stream. Callers respond to either by
/// disconnecting and, where allowed, reconnecting.
#[derive(Debug, Error)]
pub enum DataPathError {
    /// The transport could not be opened or the peer refused the login.
    #[error("not connected: {0}")]
    NotConnected(String),

    /// A read or write on an established transport failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// A port configuration string could not be parsed.
    #[error("invalid port specification: {0}")]
    InvalidPortSpec(String),
}

impl DataPathError {
    /// Wrap a mid-stream failure, logging the underlying cause.
    pub(crate) fn io(context: &str, err: impl std::fmt::Display) -> Self {
        log::info!("{}: {}", context, err);
        DataPathError::Io(format!("{}: {}", context, err))
    }
}

impl From<AgwError> for DataPathError {
    fn from(err: AgwError) -> Self {
        DataPathError::Io(err.to_string())
    }
}

/// Result type alias for data path operations.
pub type DataPathResult<T> = Result<T, DataPathError>;
