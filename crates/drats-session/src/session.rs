//! The session manager as seen by the coordinator.
//!
//! The reliable block-transfer protocol itself lives behind these traits.
//! Implementations are internally synchronised: a worker may sit in
//! [`TransferSession::recv_file`] while the coordinator calls
//! [`TransferSession::close`] from another thread.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::SessionResult;

/// What a session transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    File,
    Form,
    Socket,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::File => "file",
            SessionKind::Form => "form",
            SessionKind::Socket => "socket",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side opened the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

/// Counters a transfer session keeps about itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferStats {
    /// Status line from the transfer protocol.
    pub msg: String,
    /// Size of the object being moved, if known.
    pub total_size: u64,
    /// Payload bytes acknowledged by the peer.
    pub sent_size: u64,
    /// Payload bytes received.
    pub recv_size: u64,
    /// Bytes put on the wire including retransmissions and framing.
    pub sent_wire: u64,
    /// Blocks retransmitted so far.
    pub retries: u32,
    /// When the transfer began moving data.
    pub start_time: Option<Instant>,
}

/// Called by a session each time its transfer makes progress.
pub type StatusCallback = Box<dyn Fn(&TransferStats) + Send + Sync>;

/// One session opened by the session manager.
pub trait TransferSession: Send + Sync {
    /// Session id. Ids 0-3 are the always-on control, chat, sniff and RPC
    /// sessions.
    fn id(&self) -> u32;

    /// Session name, `TCP:<port>` for socket sessions.
    fn name(&self) -> String;

    fn kind(&self) -> SessionKind;

    /// Remote station.
    fn station(&self) -> String;

    fn set_status_callback(&self, cb: StatusCallback);

    fn stats(&self) -> TransferStats;

    /// Receive the object into `dest` (a directory for files, a file path for
    /// forms). Blocks until the transfer ends and returns where it landed.
    fn recv_file(&self, dest: &Path) -> Option<PathBuf>;

    /// Send the file at `path`. Blocks until the transfer ends.
    fn send_file(&self, path: &Path) -> bool;

    /// Read up to `max` bytes of stream data, waiting a bounded time.
    ///
    /// Returns an empty buffer when nothing arrived and
    /// [`SessionError::SessionClosed`](crate::SessionError::SessionClosed)
    /// once the session has closed.
    fn read(&self, max: usize) -> SessionResult<Vec<u8>>;

    fn write(&self, data: &[u8]) -> SessionResult<()>;

    fn close(&self, force: bool);

    fn is_closed(&self) -> bool;
}

pub type SharedSession = Arc<dyn TransferSession>;

/// Parameters for an outbound session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub name: String,
    pub dest: String,
    pub kind: SessionKind,
    /// Block size for file transfers.
    pub block_size: Option<usize>,
    /// Unacknowledged block limit for file transfers.
    pub outlimit: Option<usize>,
}

impl StartRequest {
    pub fn new(name: impl Into<String>, dest: impl Into<String>, kind: SessionKind) -> Self {
        Self {
            name: name.into(),
            dest: dest.into(),
            kind,
            block_size: None,
            outlimit: None,
        }
    }
}

/// The part of the session manager the coordinator drives.
pub trait SessionManager: Send + Sync {
    /// Open a session to `req.dest`. Blocks while the peer is contacted.
    fn start_session(&self, req: StartRequest) -> SessionResult<SharedSession>;

    /// Look up an open session.
    fn session(&self, id: u32) -> Option<SharedSession>;
}

/// Poll until `session` closes or `keep_going` returns false.
pub(crate) fn wait_closed(
    session: &dyn TransferSession,
    poll: Duration,
    keep_going: impl Fn() -> bool,
) {
    while !session.is_closed() && keep_going() {
        std::thread::sleep(poll);
    }
}
