//! WL2K error types.

use thiserror::Error;

/// Errors raised while talking to a Winlink server.
#[derive(Debug, Error)]
pub enum Wl2kError {
    /// The server said something we did not expect.
    #[error("conversation error ({0})")]
    Conversation(String),

    /// The server aborted a block stream with a `*` error line.
    #[error("error getting message: {0}")]
    Server(String),

    /// The compressor failed or timed out.
    #[error("compression failed: {0}")]
    Compression(String),

    /// A proposal asked to resume from a non-zero offset.
    #[error("offset support not implemented (offset {0})")]
    UnsupportedOffset(String),

    /// More or fewer than one message was handed to a send.
    #[error("batch send not implemented ({0} messages)")]
    BatchNotImplemented(usize),

    /// A downloaded message could not be parsed.
    #[error("malformed mail: {0}")]
    Mail(String),

    /// The link closed mid-conversation.
    #[error("connection closed")]
    Closed,

    /// No data arrived before the conversation deadline.
    #[error("timed out waiting for server")]
    Timeout,

    /// Socket or filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// AGW server failure on an RMS link.
    #[error("AGW error: {0}")]
    Agw(#[from] drats_agw::AgwError),

    /// Message store failure.
    #[error("store error: {0}")]
    Store(#[from] drats_store::StoreError),
}

/// Result type alias for WL2K operations.
pub type Wl2kResult<T> = Result<T, Wl2kError>;
