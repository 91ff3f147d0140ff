//! AGW client error types.

use drats_frame::FrameError;
use thiserror::Error;

/// Errors raised by the AGW client.
#[derive(Debug, Error)]
pub enum AgwError {
    /// Socket-level failure.
    #[error("AGW I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server closed the connection.
    #[error("AGW connection closed")]
    Closed,

    /// Fewer than 36 bytes were supplied to the header decoder.
    #[error("AGW header too short: expected 36 bytes, got {actual}")]
    HeaderTooShort {
        /// Bytes available.
        actual: usize,
    },

    /// The payload does not match the length declared in the header.
    ///
    /// The stream is desynchronized; the connection must be re-established.
    #[error("expecting payload of {expected}, got {actual}")]
    PayloadLength {
        /// Length declared by the header.
        expected: usize,
        /// Bytes actually present.
        actual: usize,
    },

    /// A callsign could not be encoded into an AX.25 address.
    #[error("invalid callsign: {0}")]
    Callsign(#[from] FrameError),
}

/// Result type alias for AGW operations.
pub type AgwResult<T> = Result<T, AgwError>;
