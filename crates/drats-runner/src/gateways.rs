//! Email and Winlink gateways handed to the router.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use crossbeam_channel::Sender;
use drats_agw::SharedAgw;
use drats_router::{EmailGateway, RouterError, RouterResult, Wl2kGateway};
use drats_store::{Message, MessageStore};
use drats_wl2k::{Compressor, Wl2kConfig, Wl2kEvent, Wl2kJob, Wl2kWorker};
use parking_lot::Mutex;

/// Writes outgoing email as RFC 822 files for a local MTA to pick up.
#[derive(Debug, Clone)]
pub struct SpoolMailer {
    dir: PathBuf,
}

impl SpoolMailer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Render `msg` as an RFC 822 message.
pub fn render_email(msg: &Message) -> String {
    let mut text = String::new();
    text.push_str(&format!("From: {}\r\n", msg.src));
    text.push_str(&format!("To: {}\r\n", msg.dst));
    text.push_str(&format!("Subject: {}\r\n", msg.subject));
    text.push_str(&format!("Date: {}\r\n", Utc::now().to_rfc2822()));
    text.push_str(&format!("Message-ID: <{}@d-rats>\r\n", msg.mid));
    text.push_str(&format!("X-DRATS-Path: {}\r\n", msg.path.join(" ")));
    for att in &msg.attachments {
        text.push_str(&format!("X-DRATS-Attachment: {} ({} bytes)\r\n", att.name, att.data.len()));
    }
    text.push_str("\r\n");
    for line in msg.body.lines() {
        text.push_str(line);
        text.push_str("\r\n");
    }
    text
}

impl EmailGateway for SpoolMailer {
    fn send_email(&self, msg: &Message) -> RouterResult<()> {
        fs::create_dir_all(&self.dir)?;
        let name = format!("{}-{}.eml", Utc::now().format("%Y%m%d%H%M%S%f"), sanitize(&msg.mid));
        let path = self.dir.join(name);
        fs::write(&path, render_email(msg))?;
        tracing::info!(to = %msg.dst, file = %path.display(), "Spooled email");
        Ok(())
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Starts one [`Wl2kWorker`] per routed message.
pub struct WinlinkGateway {
    config: Wl2kConfig,
    agw: Option<SharedAgw>,
    compressor: Arc<dyn Compressor>,
    store: MessageStore,
    events: Sender<Wl2kEvent>,
    workers: Mutex<Vec<(PathBuf, Wl2kWorker)>>,
}

impl WinlinkGateway {
    pub fn new(
        config: Wl2kConfig,
        agw: Option<SharedAgw>,
        compressor: Arc<dyn Compressor>,
        store: MessageStore,
        events: Sender<Wl2kEvent>,
    ) -> Self {
        Self {
            config,
            agw,
            compressor,
            store,
            events,
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Start a fetch for our own mail.
    pub fn fetch(&self) -> RouterResult<Wl2kWorker> {
        let link = self.config.link(self.agw.clone()).map_err(gateway_error)?;
        let worker = Wl2kWorker::spawn(
            link,
            self.compressor.clone(),
            self.store.clone(),
            &self.config.callsign,
            Wl2kJob::Fetch {
                callsign: self.config.callsign.clone(),
            },
            self.events.clone(),
        )?;
        Ok(worker)
    }

    /// Message paths whose send has finished. With `wait`, blocks until
    /// every send has.
    pub fn reap(&self, wait: bool) -> Vec<PathBuf> {
        let mut workers = self.workers.lock();
        let (done, running): (Vec<_>, Vec<_>) = workers.drain(..).partition(|(_, w)| wait || w.is_finished());
        *workers = running;
        drop(workers);

        done.into_iter()
            .map(|(path, worker)| {
                worker.join();
                path
            })
            .collect()
    }
}

fn gateway_error(e: drats_wl2k::Wl2kError) -> RouterError {
    RouterError::Gateway(e.to_string())
}

impl Wl2kGateway for WinlinkGateway {
    fn send_wl2k(&self, src: &str, address: &str, path: &Path) -> RouterResult<()> {
        let link = self.config.link(self.agw.clone()).map_err(gateway_error)?;
        tracing::info!(%src, %address, file = %path.display(), "Starting WL2K send");
        let worker = Wl2kWorker::spawn(
            link,
            self.compressor.clone(),
            self.store.clone(),
            &self.config.callsign,
            Wl2kJob::Send {
                src: src.to_string(),
                address: address.to_string(),
                path: path.to_path_buf(),
            },
            self.events.clone(),
        )?;
        self.workers.lock().push((path.to_path_buf(), worker));
        Ok(())
    }
}
