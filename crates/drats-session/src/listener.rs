//! Local TCP listeners that open socket sessions to a remote station.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::SessionResult;
use crate::session::{wait_closed, SessionKind, SessionManager, StartRequest};

/// Accept poll interval.
pub const ACCEPT_POLL: Duration = Duration::from_millis(250);

/// Name of the socket session forwarding to `dport`.
pub fn socket_session_name(dport: u16) -> String {
    format!("TCP:{}", dport)
}

/// Listens on a local port; each accepted client becomes a `TCP:<dport>`
/// session to `dest`. One client at a time.
pub struct SocketListener {
    dest: String,
    sport: u16,
    dport: u16,
    local_addr: SocketAddr,
    enabled: Arc<AtomicBool>,
    current: Arc<Mutex<Option<TcpStream>>>,
    handle: Option<JoinHandle<()>>,
}

impl SocketListener {
    /// Bind `addr:sport` and start accepting.
    pub fn spawn(
        sm: Arc<dyn SessionManager>,
        dest: &str,
        addr: &str,
        sport: u16,
        dport: u16,
    ) -> SessionResult<Self> {
        let listener = TcpListener::bind((addr, sport))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let enabled = Arc::new(AtomicBool::new(true));
        let current = Arc::new(Mutex::new(None));

        let handle = {
            let enabled = enabled.clone();
            let current = current.clone();
            let dest = dest.to_string();
            thread::Builder::new()
                .name(format!("listener-{}", dport))
                .spawn(move || accept_loop(listener, sm, dest, dport, enabled, current))?
        };

        Ok(Self {
            dest: dest.to_string(),
            sport,
            dport,
            local_addr,
            enabled,
            current,
            handle: Some(handle),
        })
    }

    pub fn dest(&self) -> &str {
        &self.dest
    }

    pub fn sport(&self) -> u16 {
        self.sport
    }

    pub fn dport(&self) -> u16 {
        self.dport
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The client socket currently being forwarded, if any.
    pub fn current_socket(&self) -> Option<TcpStream> {
        self.current
            .lock()
            .as_ref()
            .and_then(|s| s.try_clone().ok())
    }

    /// Stop accepting and wait for the listener thread.
    pub fn stop(&mut self) {
        self.enabled.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Listener TCP:{} panicked", self.dport);
            }
        }
    }
}

impl Drop for SocketListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(
    listener: TcpListener,
    sm: Arc<dyn SessionManager>,
    dest: String,
    dport: u16,
    enabled: Arc<AtomicBool>,
    current: Arc<Mutex<Option<TcpStream>>>,
) {
    let name = socket_session_name(dport);

    while enabled.load(Ordering::SeqCst) {
        let (sock, addr) = match listener.accept() {
            Ok(pair) => pair,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
                continue;
            }
            Err(e) => {
                log::warn!("{}: accept failed: {}", name, e);
                break;
            }
        };

        log::info!("{}: incoming socket connection from {}", name, addr);
        if let Err(e) = sock.set_nonblocking(false) {
            log::warn!("{}: {}", name, e);
            continue;
        }
        *current.lock() = Some(sock);

        match sm.start_session(StartRequest::new(name.clone(), dest.clone(), SessionKind::Socket)) {
            Ok(session) => {
                wait_closed(&*session, ACCEPT_POLL, || enabled.load(Ordering::SeqCst));
                log::info!("{} ended", name);
            }
            Err(e) => log::warn!("{}: {}", name, e),
        }

        if let Some(sock) = current.lock().take() {
            let _ = sock.shutdown(std::net::Shutdown::Both);
        }
    }

    log::info!("{} shutdown", name);
}
