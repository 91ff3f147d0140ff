//! Framing error types.

use thiserror::Error;

/// Errors raised while encoding or decoding link-layer frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Callsign portion of an address is longer than six characters.
    #[error("callsign `{0}' is too long")]
    CallsignTooLong(String),

    /// SSID could not be parsed as an integer.
    #[error("invalid SSID `{0}'")]
    InvalidSsid(String),

    /// SSID parsed but lies outside 0..=7.
    #[error("SSID {0} out of range (0-7)")]
    SsidOutOfRange(i64),

    /// A KISS escape byte was followed by something other than TFEND/TFESC.
    #[error("bad KISS escape of 0x{0:02X}")]
    BadEscape(u8),
}

/// Result type alias for framing operations.
pub type FrameResult<T> = Result<T, FrameError>;
