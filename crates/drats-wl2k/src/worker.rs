//! Background WL2K fetch and send.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::Utc;
use crossbeam_channel::Sender;
use drats_metrics::{metric_defs, metrics};
use drats_store::{Message, MessageStore};

use crate::client::Wl2kClient;
use crate::compress::Compressor;
use crate::error::Wl2kResult;
use crate::link::Wl2kLink;
use crate::mail::{deliver_to_store, encode_mail, ParsedMail};
use crate::message::WinLinkMessage;

/// What a worker run does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wl2kJob {
    /// Download waiting mail for `callsign`.
    Fetch { callsign: String },
    /// Upload the stored message at `path` from `src` to `address`.
    Send {
        src: String,
        address: String,
        path: PathBuf,
    },
}

/// Progress and outcome of a worker run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wl2kEvent {
    FormReceived { path: PathBuf },
    FormSent { path: PathBuf },
    Complete { ok: bool, text: String },
}

/// One WL2K session on its own thread.
pub struct Wl2kWorker {
    handle: JoinHandle<()>,
}

impl Wl2kWorker {
    /// Start `job`. Exactly one [`Wl2kEvent::Complete`] is sent when it ends.
    pub fn spawn<L: Wl2kLink + 'static>(
        link: L,
        compressor: Arc<dyn Compressor>,
        store: MessageStore,
        mycall: &str,
        job: Wl2kJob,
        events: Sender<Wl2kEvent>,
    ) -> io::Result<Self> {
        let mycall = mycall.to_string();
        let handle = thread::Builder::new().name("wl2k".into()).spawn(move || {
            let mut run = WorkerRun {
                client: Wl2kClient::new(link, compressor.clone()),
                compressor,
                store,
                mycall,
                events,
            };
            let (ok, text) = match run.run(&job) {
                Ok(text) => (true, text),
                Err(e) => {
                    log::error!("WL2K {:?} failed: {}", job, e);
                    (false, e.to_string())
                }
            };
            let _ = run.events.send(Wl2kEvent::Complete { ok, text });
        })?;
        Ok(Self { handle })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) {
        let _ = self.handle.join();
    }
}

struct WorkerRun<L: Wl2kLink> {
    client: Wl2kClient<L>,
    compressor: Arc<dyn Compressor>,
    store: MessageStore,
    mycall: String,
    events: Sender<Wl2kEvent>,
}

impl<L: Wl2kLink> WorkerRun<L> {
    fn run(&mut self, job: &Wl2kJob) -> Wl2kResult<String> {
        match job {
            Wl2kJob::Fetch { callsign } => self.fetch(callsign),
            Wl2kJob::Send { src, address, path } => self.send(src, address, path),
        }
    }

    fn fetch(&mut self, callsign: &str) -> Wl2kResult<String> {
        let count = self.client.get_messages()?;
        for msg in self.client.take_messages() {
            let mail = ParsedMail::parse(msg.content())?;
            let path = deliver_to_store(&self.store, &mail, msg.id(), callsign, &self.mycall)?;
            metrics::counter!(metric_defs::WL2K_MESSAGES_RECEIVED.name).increment(1);
            let _ = self.events.send(Wl2kEvent::FormReceived { path });
        }
        Ok(if count > 0 {
            format!("Queued {} messages", count)
        } else {
            "No messages".to_string()
        })
    }

    fn send(&mut self, src: &str, address: &str, path: &Path) -> Wl2kResult<String> {
        let stored = Message::load(path)?;
        let content = encode_mail(
            src,
            &[address],
            &stored.subject,
            &stored.body,
            &stored.attachments,
            Utc::now(),
        );
        let (mid, subject) = proposal_identity(&content);
        log::info!("Sending {} ({}) to {}", mid, subject, address);

        let msg = WinLinkMessage::from_content(&mid, content, &subject, self.compressor.as_ref())?;
        self.client.send_messages(std::slice::from_ref(&msg))?;
        metrics::counter!(metric_defs::WL2K_MESSAGES_SENT.name).increment(1);
        let _ = self.events.send(Wl2kEvent::FormSent {
            path: path.to_path_buf(),
        });
        Ok("Complete".to_string())
    }
}

/// Proposal id and name for outgoing content: its `Mid` and `Subject`
/// headers, or a time-based id and `Message`.
pub fn proposal_identity(content: &[u8]) -> (String, String) {
    let parsed = ParsedMail::parse(content).ok();
    let header = |name: &str| {
        parsed
            .as_ref()
            .and_then(|m| m.header(name))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    match (header("Mid"), header("Subject")) {
        (Some(mid), Some(subject)) => (mid, subject),
        _ => (Utc::now().format("%H%M%SDRATS").to_string(), "Message".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proposal_identity() {
        let content = b"Mid: D120000KK7D\r\nSubject: Hello\r\nBody: 0\r\n\r\n";
        assert_eq!(
            proposal_identity(content),
            ("D120000KK7D".to_string(), "Hello".to_string())
        );

        let (mid, subject) = proposal_identity(b"garbage");
        assert!(mid.ends_with("DRATS"));
        assert_eq!(mid.len(), 11);
        assert_eq!(subject, "Message");
    }
}
