//! Background transfer workers, one per active session.

use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use drats_metrics::{metric_defs, metrics};
use drats_store::{add_path_element, msg_unlock, MessageStore};
use parking_lot::Mutex;

use crate::bridge::run_bridge;
use crate::coordinator::{CoordinatorEvent, RestartInfo};
use crate::progress::{format_interrupted, format_status, percent_complete, ProgressKey, STATUS_COMPLETED};
use crate::session::{SessionKind, SharedSession};

/// What a worker does with its session.
pub enum WorkerJob {
    /// Receive a file into a directory.
    FileRecv { dir: PathBuf },
    /// Send a file.
    FileSend { path: PathBuf },
    /// Receive a form into a fresh Inbox file, stamping `mycall` on its path.
    FormRecv { store: MessageStore, mycall: String },
    /// Send a form file.
    FormSend { path: PathBuf },
    /// Bridge a local TCP socket to the session.
    Socket { stream: TcpStream, timeout: Duration },
}

impl WorkerJob {
    fn kind(&self) -> SessionKind {
        match self {
            WorkerJob::FileRecv { .. } | WorkerJob::FileSend { .. } => SessionKind::File,
            WorkerJob::FormRecv { .. } | WorkerJob::FormSend { .. } => SessionKind::Form,
            WorkerJob::Socket { .. } => SessionKind::Socket,
        }
    }
}

/// Handle to a running worker thread.
pub struct SessionWorker {
    id: u32,
    kind: SessionKind,
    enabled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SessionWorker {
    /// Start a worker thread for `session`.
    pub fn spawn(
        session: SharedSession,
        job: WorkerJob,
        events: Sender<CoordinatorEvent>,
    ) -> std::io::Result<Self> {
        let id = session.id();
        let kind = job.kind();
        let enabled = Arc::new(AtomicBool::new(true));

        let ctx = WorkerContext {
            session,
            events,
            enabled: enabled.clone(),
            pct_complete: Arc::new(Mutex::new(0.0)),
        };

        let handle = thread::Builder::new()
            .name(format!("session-{}", id))
            .spawn(move || ctx.run(job))?;

        metrics::counter!(metric_defs::SESSION_WORKERS_STARTED.name, "kind" => kind.as_str()).increment(1);
        metrics::gauge!(metric_defs::SESSION_WORKERS_RUNNING.name).increment(1.0);

        Ok(Self {
            id,
            kind,
            enabled,
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Ask the worker to stop. Socket bridges notice within one timeout;
    /// file transfers notice when their session is closed.
    pub fn stop(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    /// Wait for the worker thread to exit.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Session {} worker panicked", self.id);
            }
        }
    }
}

struct WorkerContext {
    session: SharedSession,
    events: Sender<CoordinatorEvent>,
    enabled: Arc<AtomicBool>,
    pct_complete: Arc<Mutex<f64>>,
}

impl WorkerContext {
    fn run(self, job: WorkerJob) {
        let kind = job.kind();
        let ok = match job {
            WorkerJob::FileRecv { dir } => self.file_recv(&dir),
            WorkerJob::FileSend { path } => self.file_send(&path, false),
            WorkerJob::FormRecv { store, mycall } => self.form_recv(&store, &mycall),
            WorkerJob::FormSend { path } => self.file_send(&path, true),
            WorkerJob::Socket { stream, timeout } => {
                log::info!("Socket thread alive ({:?} timeout)", timeout);
                run_bridge(&*self.session, stream, timeout, &self.enabled, &self.events);
                log::info!("Socket thread exiting");
                true
            }
        };

        let name = if ok {
            metric_defs::SESSION_WORKERS_COMPLETED.name
        } else {
            metric_defs::SESSION_WORKERS_FAILED.name
        };
        metrics::counter!(name, "kind" => kind.as_str()).increment(1);
        metrics::gauge!(metric_defs::SESSION_WORKERS_RUNNING.name).decrement(1.0);
    }

    fn emit(&self, event: CoordinatorEvent) {
        if self.events.send(event).is_err() {
            log::debug!("Session {}: event receiver gone", self.session.id());
        }
    }

    fn status(&self, text: impl Into<String>) {
        self.emit(CoordinatorEvent::StatusUpdate {
            id: self.session.id(),
            text: text.into(),
        });
    }

    /// Route the session's progress callbacks into status events.
    fn watch_progress(&self, key: ProgressKey) {
        let id = self.session.id();
        let events = self.events.clone();
        let pct_complete = self.pct_complete.clone();
        self.session.set_status_callback(Box::new(move |stats| {
            *pct_complete.lock() = percent_complete(stats, key);
            let text = format_status(stats, key, Instant::now());
            // The receiver may already be gone at shutdown.
            let _ = events.send(CoordinatorEvent::StatusUpdate { id, text });
        }));
    }

    fn completed(&self, what: &str) {
        self.status(STATUS_COMPLETED);

        let stats = self.session.stats();
        let (size, units) = if stats.total_size > 1024 {
            (stats.total_size >> 10, "KB")
        } else {
            (stats.total_size, "B")
        };
        let rate = stats
            .start_time
            .map(|t| t.elapsed().as_secs_f64())
            .filter(|e| *e > 0.0)
            .map(|e| format!(" @ {:.2} B/s", stats.total_size as f64 / e))
            .unwrap_or_default();
        log::info!(
            "Session {}: transfer{} complete ({}{}{})",
            self.session.id(),
            what,
            size,
            units,
            rate
        );
    }

    fn failed(&self, restart: Option<RestartInfo>) {
        let text = format_interrupted(*self.pct_complete.lock());
        self.emit(CoordinatorEvent::SessionEnded {
            id: self.session.id(),
            text,
            restart,
        });
    }

    fn file_recv(&self, dir: &Path) -> bool {
        self.watch_progress(ProgressKey::Recv);
        match self.session.recv_file(dir) {
            Some(path) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                self.completed(&format!(" of file {}", name));
                self.emit(CoordinatorEvent::FileReceived {
                    id: self.session.id(),
                    path,
                });
                true
            }
            None => {
                self.failed(None);
                false
            }
        }
    }

    fn file_send(&self, path: &Path, form: bool) -> bool {
        self.watch_progress(ProgressKey::Sent);
        if self.session.send_file(path) {
            let id = self.session.id();
            let path = path.to_path_buf();
            if form {
                self.completed("");
                self.emit(CoordinatorEvent::FormSent { id, path });
            } else {
                self.completed(&format!(" of file {}", path.display()));
                self.emit(CoordinatorEvent::FileSent { id, path });
            }
            true
        } else {
            self.failed(Some(RestartInfo {
                station: self.session.station(),
                path: path.to_path_buf(),
            }));
            false
        }
    }

    fn form_recv(&self, store: &MessageStore, mycall: &str) -> bool {
        self.watch_progress(ProgressKey::Recv);

        let newfn = match store.lock_new_inbox_name() {
            Ok(newfn) => newfn,
            Err(e) => {
                log::warn!("Unable to lock incoming message file: {}", e);
                self.failed(None);
                return false;
            }
        };

        let got = self.session.recv_file(&newfn);
        let ok = match got {
            Some(path) if path == newfn => {
                if let Err(e) = add_path_element(&newfn, mycall) {
                    log::warn!("Unable to stamp path on {}: {}", newfn.display(), e);
                }
                self.completed(" of form");
                self.emit(CoordinatorEvent::FormReceived {
                    id: self.session.id(),
                    path: newfn.clone(),
                });
                true
            }
            _ => {
                self.failed(None);
                log::info!("Form transfer from {} failed", self.session.station());
                false
            }
        };
        msg_unlock(&newfn);
        ok
    }
}
