//! Session coordinator error types.

use thiserror::Error;

/// Errors raised while coordinating sessions.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A listener already forwards to this port.
    #[error("listener for {0} already active")]
    ListenerActive(u16),

    /// An incoming socket session named a port with no `tcp_in` forward.
    #[error("port {0} not configured")]
    PortNotConfigured(u16),

    /// The local socket of a bridge went away.
    #[error("socket is closed")]
    SocketClosed,

    /// The radio session was closed underneath a worker.
    #[error("session is closed")]
    SessionClosed,

    /// A socket session name was not `TCP:<port>`.
    #[error("invalid socket session name {0:?}")]
    InvalidSessionName(String),

    /// The session manager could not start a session.
    #[error("unable to start session: {0}")]
    StartFailed(String),

    /// Socket or thread failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Message store failure.
    #[error("store error: {0}")]
    Store(#[from] drats_store::StoreError),
}

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
