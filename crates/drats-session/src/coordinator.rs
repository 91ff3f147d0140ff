//! Turns session-manager notifications into transfer workers.

use std::collections::HashMap;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;
use drats_store::MessageStore;
use parking_lot::Mutex;

use crate::error::{SessionError, SessionResult};
use crate::listener::SocketListener;
use crate::session::{Direction, SessionKind, SessionManager, SharedSession, StartRequest};
use crate::worker::{SessionWorker, WorkerJob};

/// Highest session id reserved for control, chat, sniff and RPC.
pub const RESERVED_SESSION_MAX: u32 = 3;

/// What a failed send needs to be tried again later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartInfo {
    pub station: String,
    pub path: PathBuf,
}

/// Notifications for whoever presents session activity.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorEvent {
    SessionStarted { id: u32, kind: SessionKind },
    StatusUpdate { id: u32, text: String },
    SessionEnded { id: u32, text: String, restart: Option<RestartInfo> },
    FileReceived { id: u32, path: PathBuf },
    FormReceived { id: u32, path: PathBuf },
    FileSent { id: u32, path: PathBuf },
    FormSent { id: u32, path: PathBuf },
}

/// A configured `tcp_in` forward: incoming `TCP:<port>` sessions connect to
/// `host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpForward {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Local station callsign.
    pub mycall: String,
    /// Where received files land.
    pub download_dir: PathBuf,
    /// Block size for outgoing file sessions.
    pub block_size: usize,
    /// Unacknowledged block limit for outgoing file sessions.
    pub outlimit: usize,
    /// Socket bridge poll interval.
    pub sockflush: Duration,
    pub tcp_in: Vec<TcpForward>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            mycall: String::new(),
            download_dir: PathBuf::from("."),
            block_size: 512,
            outlimit: 4,
            sockflush: Duration::from_millis(500),
            tcp_in: Vec::new(),
        }
    }
}

/// Owns one worker per active transfer session.
pub struct SessionCoordinator {
    config: CoordinatorConfig,
    sm: Arc<dyn SessionManager>,
    store: MessageStore,
    events: Sender<CoordinatorEvent>,
    workers: Mutex<HashMap<u32, SessionWorker>>,
    outgoing_files: Mutex<Vec<PathBuf>>,
    outgoing_forms: Mutex<Vec<PathBuf>>,
    listeners: Mutex<HashMap<u16, SocketListener>>,
}

impl SessionCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        sm: Arc<dyn SessionManager>,
        store: MessageStore,
        events: Sender<CoordinatorEvent>,
    ) -> Self {
        Self {
            config,
            sm,
            store,
            events,
            workers: Mutex::new(HashMap::new()),
            outgoing_files: Mutex::new(Vec::new()),
            outgoing_forms: Mutex::new(Vec::new()),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    fn emit(&self, event: CoordinatorEvent) {
        if self.events.send(event).is_err() {
            log::debug!("Coordinator event receiver gone");
        }
    }

    fn status(&self, id: u32, text: String) {
        self.emit(CoordinatorEvent::StatusUpdate { id, text });
    }

    /// Session-manager callback. `reason` is `new,in`, `new,out` or `end`.
    pub fn session_cb(&self, reason: &str, session: SharedSession) {
        match reason {
            "new,in" => self.new_session(session, Direction::In),
            "new,out" => self.new_session(session, Direction::Out),
            "end" => self.end_session(session.id()),
            other => log::debug!("Ignoring session notice {:?}", other),
        }
    }

    /// Start the worker for a freshly opened session.
    pub fn new_session(&self, session: SharedSession, direction: Direction) {
        if session.id() <= RESERVED_SESSION_MAX {
            return;
        }

        let kind = session.kind();
        log::info!("New session ({:?}) of type {}", direction, kind);
        self.emit(CoordinatorEvent::SessionStarted {
            id: session.id(),
            kind,
        });

        let result = match kind {
            SessionKind::Form => self.new_form_xfer(session.clone(), direction),
            SessionKind::File => self.new_file_xfer(session.clone(), direction),
            SessionKind::Socket => self.new_socket(session.clone(), direction),
        };

        if let Err(e) = result {
            log::warn!("Session {}: {}", session.id(), e);
            self.status(session.id(), format!("Error starting {} session: {}", kind, e));
            session.close(false);
        }
    }

    /// A session ended. Forget its worker, or report the end if it had none.
    pub fn end_session(&self, id: u32) {
        if self.workers.lock().remove(&id).is_none() {
            self.emit(CoordinatorEvent::SessionEnded {
                id,
                text: "Ended".to_string(),
                restart: None,
            });
        }
    }

    fn start_worker(&self, session: SharedSession, job: WorkerJob) -> SessionResult<()> {
        let id = session.id();
        let worker = SessionWorker::spawn(session, job, self.events.clone())?;
        self.workers.lock().insert(id, worker);
        Ok(())
    }

    fn new_file_xfer(&self, session: SharedSession, direction: Direction) -> SessionResult<()> {
        self.status(
            session.id(),
            format!("File transfer of {} started with {}", session.name(), session.station()),
        );
        let job = match direction {
            Direction::In => WorkerJob::FileRecv {
                dir: self.config.download_dir.clone(),
            },
            Direction::Out => WorkerJob::FileSend {
                path: pop_oldest(&self.outgoing_files, "file")?,
            },
        };
        self.start_worker(session, job)
    }

    fn new_form_xfer(&self, session: SharedSession, direction: Direction) -> SessionResult<()> {
        self.status(
            session.id(),
            format!("Message transfer of {} started with {}", session.name(), session.station()),
        );
        let job = match direction {
            Direction::In => WorkerJob::FormRecv {
                store: self.store.clone(),
                mycall: self.config.mycall.clone(),
            },
            Direction::Out => WorkerJob::FormSend {
                path: pop_oldest(&self.outgoing_forms, "form")?,
            },
        };
        self.start_worker(session, job)
    }

    fn new_socket(&self, session: SharedSession, direction: Direction) -> SessionResult<()> {
        self.status(
            session.id(),
            format!("Socket session {} started with {}", session.name(), session.station()),
        );

        let name = session.name();
        let port = parse_socket_name(&name)?;

        let stream = match direction {
            Direction::In => {
                let fwd = self
                    .config
                    .tcp_in
                    .iter()
                    .find(|f| f.port == port)
                    .ok_or(SessionError::PortNotConfigured(port))?;
                TcpStream::connect((fwd.host.as_str(), fwd.port))?
            }
            Direction::Out => self
                .listeners
                .lock()
                .get(&port)
                .and_then(|l| l.current_socket())
                .ok_or(SessionError::SocketClosed)?,
        };

        self.start_worker(
            session,
            WorkerJob::Socket {
                stream,
                timeout: self.config.sockflush,
            },
        )
    }

    /// Forward connections on local port `sport` to `dest` as `TCP:<dport>`.
    pub fn create_socket_listener(&self, sport: u16, dport: u16, dest: &str) -> SessionResult<()> {
        self.create_socket_listener_on("0.0.0.0", sport, dport, dest)
    }

    /// Like [`create_socket_listener`](Self::create_socket_listener) with an
    /// explicit bind address.
    pub fn create_socket_listener_on(
        &self,
        addr: &str,
        sport: u16,
        dport: u16,
        dest: &str,
    ) -> SessionResult<()> {
        let mut listeners = self.listeners.lock();
        if listeners.contains_key(&dport) {
            return Err(SessionError::ListenerActive(dport));
        }
        log::info!("Starting a listener for port {}->{}:{}", sport, dest, dport);
        let listener = SocketListener::spawn(self.sm.clone(), dest, addr, sport, dport)?;
        listeners.insert(dport, listener);
        Ok(())
    }

    /// Local address of the listener forwarding to `dport`.
    pub fn listener_addr(&self, dport: u16) -> Option<std::net::SocketAddr> {
        self.listeners.lock().get(&dport).map(|l| l.local_addr())
    }

    /// Queue a file and start a session to send it.
    pub fn send_file(&self, dest: &str, path: &Path, name: Option<&str>) -> SessionResult<()> {
        let name = name
            .map(str::to_string)
            .or_else(|| path.file_name().map(|n| n.to_string_lossy().to_string()))
            .unwrap_or_default();

        self.outgoing_files.lock().insert(0, path.to_path_buf());
        log::info!("Outgoing files: {:?}", self.outgoing_files.lock());

        let mut req = StartRequest::new(name, dest, SessionKind::File);
        req.block_size = Some(self.config.block_size);
        req.outlimit = Some(self.config.outlimit);
        self.start_in_background(req)
    }

    /// Queue a form and start a session to send it.
    pub fn send_form(&self, dest: &str, path: &Path, name: Option<&str>) -> SessionResult<()> {
        self.outgoing_forms.lock().insert(0, path.to_path_buf());
        log::info!("Outgoing forms: {:?}", self.outgoing_forms.lock());

        let req = StartRequest::new(name.unwrap_or("Form"), dest, SessionKind::Form);
        self.start_in_background(req)
    }

    fn start_in_background(&self, req: StartRequest) -> SessionResult<()> {
        let sm = self.sm.clone();
        thread::Builder::new()
            .name(format!("start-{}", req.kind))
            .spawn(move || {
                let dest = req.dest.clone();
                if let Err(e) = sm.start_session(req) {
                    log::warn!("Unable to start session to {}: {}", dest, e);
                }
            })?;
        Ok(())
    }

    /// Close a session. Ids 0 and 1 (control and chat) cannot be cancelled.
    pub fn cancel_session(&self, id: u32, force: bool) {
        if id < 2 {
            return;
        }
        let Some(session) = self.sm.session(id) else {
            log::info!("Session {} not found", id);
            return;
        };
        if let Some(worker) = self.workers.lock().remove(&id) {
            worker.stop();
        }
        session.close(force);
    }

    /// Number of workers currently tracked.
    pub fn active_workers(&self) -> usize {
        self.workers.lock().len()
    }

    /// Stop every listener and worker.
    pub fn shutdown(&self) {
        let listeners: Vec<_> = self.listeners.lock().drain().collect();
        for (dport, mut listener) in listeners {
            log::info!("Stopping TCP:{}", dport);
            listener.stop();
        }

        let workers: Vec<_> = self.workers.lock().drain().map(|(_, w)| w).collect();
        for w in &workers {
            w.stop();
            if let Some(session) = self.sm.session(w.id()) {
                session.close(true);
            }
        }
        for mut w in workers {
            w.join();
        }
    }
}

/// Outgoing artifacts are queued newest first and taken oldest first.
fn pop_oldest(queue: &Mutex<Vec<PathBuf>>, what: &str) -> SessionResult<PathBuf> {
    queue
        .lock()
        .pop()
        .ok_or_else(|| SessionError::StartFailed(format!("no outgoing {} queued", what)))
}

/// Port number of a `TCP:<port>` session name.
pub fn parse_socket_name(name: &str) -> SessionResult<u16> {
    name.split_once(':')
        .and_then(|(_, port)| port.parse().ok())
        .ok_or_else(|| SessionError::InvalidSessionName(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_socket_name() {
        assert_eq!(parse_socket_name("TCP:8080").unwrap(), 8080);
        assert!(matches!(
            parse_socket_name("TCP"),
            Err(SessionError::InvalidSessionName(_))
        ));
        assert!(parse_socket_name("TCP:http").is_err());
    }

    #[test]
    fn test_pop_oldest() {
        let queue = Mutex::new(Vec::new());
        queue.lock().insert(0, PathBuf::from("first"));
        queue.lock().insert(0, PathBuf::from("second"));
        assert_eq!(pop_oldest(&queue, "file").unwrap(), PathBuf::from("first"));
        assert_eq!(pop_oldest(&queue, "file").unwrap(), PathBuf::from("second"));
        assert!(pop_oldest(&queue, "file").is_err());
    }
}
