//! Subcommand implementations.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};
use drats_router::{MessageRouter, RouterEvent, Wl2kGateway};
use drats_store::{msg_lock, msg_unlock, Folder, Message, MessageStore};
use drats_transport::DataPath;
use drats_wl2k::{LzhufProcess, Wl2kEvent, WL2K_SENDER_PREFIX};

use crate::config::{Config, Wl2kModeSetting};
use crate::error::{RunnerError, RunnerResult};
use crate::gateways::{SpoolMailer, WinlinkGateway};
use crate::stations::StaticStations;

const WATCH_POLL: Duration = Duration::from_millis(250);

/// Flag cleared by Ctrl-C.
pub fn install_stop_handler() -> RunnerResult<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })?;
    Ok(running)
}

/// List configured ports.
pub fn list_ports(config: &Config) -> RunnerResult<()> {
    for port in config.port_configs()? {
        let state = if port.enabled { "enabled" } else { "disabled" };
        match port.open(&config.callsign) {
            Ok(path) => println!("{:<12} {:<9} {}", port.name, state, path),
            Err(e) => println!("{:<12} {:<9} {} ({})", port.name, state, port.spec, e),
        }
    }
    Ok(())
}

/// Print traffic on `port` until interrupted or `count` reads returned data.
pub fn monitor(config: &Config, port: &str, count: Option<usize>, running: &AtomicBool) -> RunnerResult<()> {
    let port = config.port(port)?;
    let mut path = port.open(&config.callsign)?;
    path.connect()?;
    tracing::info!(port = %port.name, path = %path, "Monitoring");

    let mut seen = 0;
    while running.load(Ordering::SeqCst) && count.map_or(true, |c| seen < c) {
        let data = path.read_all_waiting()?;
        if data.is_empty() {
            continue;
        }
        seen += 1;
        println!("{}: {} bytes {}", port.name, data.len(), hex::encode(&data));
        println!("{}: {}", port.name, String::from_utf8_lossy(&data).escape_debug());
    }
    path.disconnect();
    Ok(())
}

/// Remove every message lock left in the store.
pub fn clear_locks(config: &Config) -> RunnerResult<()> {
    let store = MessageStore::open(&config.store_dir)?;
    let removed = store.clear_all_locks()?;
    println!("Removed {} lock(s)", removed);
    Ok(())
}

/// Router, gateways and the channels they report on.
pub struct Station {
    store: MessageStore,
    winlink: Arc<WinlinkGateway>,
    router: MessageRouter,
    router_events: Receiver<RouterEvent>,
    wl2k_events: Receiver<Wl2kEvent>,
    sent: HashSet<PathBuf>,
    failures: Vec<String>,
    /// Held open for the RMS link.
    _rms_path: Option<DataPath>,
}

impl Station {
    pub fn build(config: &Config) -> RunnerResult<Self> {
        let store = MessageStore::open(&config.store_dir)?;
        let stations = Arc::new(StaticStations::new(config.stations.clone()));
        let mailer = Arc::new(SpoolMailer::new(&config.email_spool));

        let rms_path = match config.wl2k.mode {
            Wl2kModeSetting::Rms => Some(open_rms_port(config)?),
            Wl2kModeSetting::Network => None,
        };
        let agw = rms_path.as_ref().and_then(DataPath::agw_connection);
        let (wl2k_tx, wl2k_events) = unbounded();
        let winlink = Arc::new(WinlinkGateway::new(
            config.wl2k_config(),
            agw,
            Arc::new(LzhufProcess::new(&config.lzhuf_path)),
            store.clone(),
            wl2k_tx,
        ));

        let (router_tx, router_events) = unbounded();
        let router = MessageRouter::new(config.router_config(), store.clone(), stations, router_tx)
            .with_email(mailer)
            .with_wl2k(winlink.clone());

        Ok(Self {
            store,
            winlink,
            router,
            router_events,
            wl2k_events,
            sent: HashSet::new(),
            failures: Vec::new(),
            _rms_path: rms_path,
        })
    }

    /// One routing pass, then wait for any gateway sends it started.
    pub fn route_once(&mut self) -> RunnerResult<()> {
        self.router.run_pass();
        self.drain(true)?;
        self.router.release_pending();
        self.result()
    }

    /// Route on the router's own thread until `running` clears.
    pub fn route_watch(&mut self, running: &AtomicBool) -> RunnerResult<()> {
        self.router.start()?;
        while running.load(Ordering::SeqCst) {
            self.drain(false)?;
            thread::sleep(WATCH_POLL);
        }
        tracing::info!("Stopping router");
        self.router.stop();
        self.drain(true)?;
        self.router.release_pending();
        Ok(())
    }

    /// Fetch our Winlink mail into the store.
    pub fn wl2k_fetch(&mut self) -> RunnerResult<()> {
        self.winlink.fetch()?.join();
        self.drain(true)?;
        self.result()
    }

    /// Send one stored message through Winlink.
    pub fn wl2k_send(&mut self, path: &Path, to: Option<&str>) -> RunnerResult<()> {
        let msg = Message::load(path)?;
        let address = match to {
            Some(to) => to.to_string(),
            None => msg
                .dst
                .strip_prefix(WL2K_SENDER_PREFIX)
                .unwrap_or(&msg.dst)
                .to_string(),
        };
        if !msg_lock(path)? {
            return Err(RunnerError::Failed(format!("{} is locked", path.display())));
        }
        if let Err(e) = self.winlink.send_wl2k(&msg.src, &address, path) {
            msg_unlock(path);
            return Err(e.into());
        }
        self.drain(true)?;
        self.result()
    }

    fn result(&mut self) -> RunnerResult<()> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(RunnerError::Failed(std::mem::take(&mut self.failures).join("; ")))
        }
    }

    /// Report pending events. Finished WL2K sends are moved to Sent or
    /// unlocked; with `wait` every running send is waited for first.
    fn drain(&mut self, wait: bool) -> RunnerResult<()> {
        while let Ok(event) = self.router_events.try_recv() {
            self.router_event(event)?;
        }
        let finished = self.winlink.reap(wait);
        while let Ok(event) = self.wl2k_events.try_recv() {
            self.wl2k_event(event)?;
        }
        for path in finished {
            if !self.sent.remove(&path) {
                tracing::warn!(file = %path.display(), "WL2K send did not complete");
                msg_unlock(&path);
            }
        }
        Ok(())
    }

    fn router_event(&mut self, event: RouterEvent) -> RunnerResult<()> {
        match event {
            RouterEvent::SendForm { call, port, path } => {
                println!("queued {} for {} on {}", path.display(), call, port);
            }
            RouterEvent::PingStation { call, port } => println!("ping {} on {}", call, port),
            RouterEvent::FormSent { path } => {
                let sent = self.move_to_sent(&path)?;
                println!("sent {}", sent.display());
            }
            RouterEvent::GivingUp { call } => println!("giving up on {}", call),
            RouterEvent::Event(text) => println!("{}", text),
        }
        Ok(())
    }

    fn wl2k_event(&mut self, event: Wl2kEvent) -> RunnerResult<()> {
        match event {
            Wl2kEvent::FormReceived { path } => println!("received {}", path.display()),
            Wl2kEvent::FormSent { path } => {
                let sent = self.move_to_sent(&path)?;
                self.sent.insert(path);
                println!("sent {}", sent.display());
            }
            Wl2kEvent::Complete { ok, text } => {
                println!("wl2k: {}", text);
                if !ok {
                    self.failures.push(text);
                }
            }
        }
        Ok(())
    }

    fn move_to_sent(&self, path: &Path) -> RunnerResult<PathBuf> {
        let sent = self.store.move_to_folder(path, Folder::Sent)?;
        msg_unlock(path);
        Ok(sent)
    }
}

fn open_rms_port(config: &Config) -> RunnerResult<DataPath> {
    let port = config.port(&config.wl2k.rms_port)?;
    let mut path = port.open(&config.callsign)?;
    if !matches!(path, DataPath::Agw(_)) {
        return Err(RunnerError::Invalid(format!("port {} is not an AGWPE port", port.name)));
    }
    path.connect()?;
    Ok(path)
}
