//! Forwarding between a local TCP socket and a radio session.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::Sender;

use crate::coordinator::CoordinatorEvent;
use crate::error::{SessionError, SessionResult};
use crate::progress::format_socket_status;
use crate::session::TransferSession;

/// Bytes moved per direction per iteration.
pub const BRIDGE_CHUNK: usize = 512;

/// Read whatever the socket has within its timeout.
///
/// An orderly close by the peer is [`SessionError::SocketClosed`].
fn socket_read(stream: &mut TcpStream, len: usize) -> SessionResult<Vec<u8>> {
    let mut buf = vec![0u8; len];
    match stream.read(&mut buf) {
        Ok(0) => Err(SessionError::SocketClosed),
        Ok(n) => {
            buf.truncate(n);
            Ok(buf)
        }
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Shuttle bytes both ways until either side closes or `enabled` clears.
/// Both ends are closed on return.
pub fn run_bridge(
    session: &dyn TransferSession,
    mut stream: TcpStream,
    timeout: Duration,
    enabled: &AtomicBool,
    events: &Sender<CoordinatorEvent>,
) {
    if let Err(e) = stream.set_read_timeout(Some(timeout)) {
        log::warn!("Unable to set socket timeout: {}", e);
    }

    while enabled.load(Ordering::SeqCst) {
        let from_socket = match socket_read(&mut stream, BRIDGE_CHUNK) {
            Ok(data) => data,
            Err(e) => {
                log::info!("Session {}: local socket: {}", session.id(), e);
                break;
            }
        };

        let from_radio = match session.read(BRIDGE_CHUNK) {
            Ok(data) => data,
            Err(e) => {
                log::info!("Session {}: {}", session.id(), e);
                break;
            }
        };

        let _ = events.send(CoordinatorEvent::StatusUpdate {
            id: session.id(),
            text: format_socket_status(&session.stats()),
        });

        if !from_socket.is_empty() {
            log::debug!("Sending socket data ({})", from_socket.len());
            if let Err(e) = session.write(&from_socket) {
                log::info!("Session {}: write failed: {}", session.id(), e);
                break;
            }
        }

        if !from_radio.is_empty() {
            log::debug!("Sending radio data ({})", from_radio.len());
            if let Err(e) = stream.write_all(&from_radio) {
                log::info!("Session {}: local socket write failed: {}", session.id(), e);
                break;
            }
        }
    }

    log::info!("Closing session {}", session.id());
    session.close(false);
    let _ = stream.shutdown(Shutdown::Both);
}
