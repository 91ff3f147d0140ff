//! The router thread and one routing pass.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use drats_metrics::{metric_defs, metrics};
use drats_store::{add_path_element, msg_is_locked, msg_lock, msg_unlock, Folder, Message, MessageStore};
use parking_lot::Mutex;

use crate::access::EmailAccess;
use crate::error::{RouterError, RouterResult};
use crate::policy::{
    choose_route, is_wl2k, HeardStation, RouteContext, RouteDecision, StationList, EMAIL_PATH_TAG,
};
use crate::routes::RouteTable;
use crate::state::{RoutingState, FAILURE_LIMIT};

/// Notifications from the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterEvent {
    /// Start a form session sending `path` to `call` over `port`.
    SendForm { call: String, port: String, path: PathBuf },
    /// Probe a stale station.
    PingStation { call: String, port: String },
    /// A message left through a gateway.
    FormSent { path: PathBuf },
    /// A station reached the failure limit.
    GivingUp { call: String },
    /// Free-form event text.
    Event(String),
}

/// Stations currently heard, per radio port.
pub trait StationSource: Send + Sync {
    fn stations(&self) -> HashMap<String, Vec<HeardStation>>;
}

/// Outbound email.
pub trait EmailGateway: Send + Sync {
    fn send_email(&self, msg: &Message) -> RouterResult<()>;
}

/// Outbound Winlink.
pub trait Wl2kGateway: Send + Sync {
    /// Start sending the message at `path` from `src` to the Winlink
    /// `address` (without the `WL2K:` prefix).
    fn send_wl2k(&self, src: &str, address: &str, path: &Path) -> RouterResult<()>;
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Local station callsign.
    pub mycall: String,
    /// Interval between passes.
    pub msg_flush: Duration,
    /// Run passes on the interval, not only when triggered.
    pub msg_forward: bool,
    /// Stations not heard for this long are stale.
    pub station_msg_ttl: Duration,
    /// Static routes file, read at the start of each pass.
    pub routes_file: Option<PathBuf>,
    pub email_access: EmailAccess,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            mycall: String::new(),
            msg_flush: Duration::from_secs(30),
            msg_forward: true,
            station_msg_ttl: Duration::from_secs(600),
            routes_file: None,
            email_access: EmailAccess::default(),
        }
    }
}

/// Outbox messages owned by this pass, grouped by destination.
type Queue = Vec<(String, Vec<PathBuf>)>;

struct RouterInner {
    config: RouterConfig,
    store: MessageStore,
    stations: Arc<dyn StationSource>,
    email: Option<Arc<dyn EmailGateway>>,
    wl2k: Option<Arc<dyn Wl2kGateway>>,
    events: Sender<RouterEvent>,
    state: Mutex<RoutingState>,
    enabled: AtomicBool,
    wakeup: Receiver<()>,
}

/// Store-and-forward message router.
pub struct MessageRouter {
    inner: Arc<RouterInner>,
    trigger: Sender<()>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl MessageRouter {
    pub fn new(
        config: RouterConfig,
        store: MessageStore,
        stations: Arc<dyn StationSource>,
        events: Sender<RouterEvent>,
    ) -> Self {
        let (trigger, wakeup) = crossbeam_channel::unbounded();
        Self {
            inner: Arc::new(RouterInner {
                config,
                store,
                stations,
                email: None,
                wl2k: None,
                events,
                state: Mutex::new(RoutingState::new()),
                enabled: AtomicBool::new(false),
                wakeup,
            }),
            trigger,
            thread: Mutex::new(None),
        }
    }

    fn inner_mut(&mut self) -> Option<&mut RouterInner> {
        Arc::get_mut(&mut self.inner)
    }

    /// Route email through `gateway`. Only before the thread starts.
    pub fn with_email(mut self, gateway: Arc<dyn EmailGateway>) -> Self {
        if let Some(inner) = self.inner_mut() {
            inner.email = Some(gateway);
        }
        self
    }

    /// Route `WL2K:` messages through `gateway`. Only before the thread
    /// starts.
    pub fn with_wl2k(mut self, gateway: Arc<dyn Wl2kGateway>) -> Self {
        if let Some(inner) = self.inner_mut() {
            inner.wl2k = Some(gateway);
        }
        self
    }

    /// Start the router thread.
    pub fn start(&self) -> RouterResult<()> {
        log::info!("Starting message router thread");
        while self.inner.wakeup.try_recv().is_ok() {}
        self.inner.enabled.store(true, Ordering::SeqCst);

        let inner = self.inner.clone();
        let handle = thread::Builder::new()
            .name("msg-router".to_string())
            .spawn(move || inner.run())?;
        *self.thread.lock() = Some(handle);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.thread.lock().as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Run a pass now, starting the thread if it is not running.
    pub fn trigger(&self) -> RouterResult<()> {
        if self.is_running() {
            let _ = self.trigger.send(());
            Ok(())
        } else {
            self.start()
        }
    }

    /// Stop the thread and wait for the pass in progress to finish.
    pub fn stop(&self) {
        self.inner.enabled.store(false, Ordering::SeqCst);
        let _ = self.trigger.send(());
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                log::error!("Message router thread panicked");
            }
        }
    }

    /// Run one routing pass on the calling thread.
    pub fn run_pass(&self) {
        self.inner.run_pass();
    }

    /// A form session started by [`RouterEvent::SendForm`] finished.
    ///
    /// On success the destination is stamped on the message path and its
    /// failure count is cleared. On failure the count goes up. Either way
    /// the message is unlocked and the port freed.
    pub fn form_xfer_done(&self, path: &Path, port: &str, failed: bool) -> RouterResult<()> {
        self.inner.form_xfer_done(path, port, failed)
    }

    /// Unlock messages handed out for sending and forget them.
    pub fn release_pending(&self) {
        let mut state = self.inner.state.lock();
        for file in state.pending_files() {
            msg_unlock(&file);
        }
        state.clear_pending();
    }

    /// Consecutive failures recorded for `call`.
    pub fn failures(&self, call: &str) -> u32 {
        self.inner.state.lock().failures(call)
    }
}

impl Drop for MessageRouter {
    fn drop(&mut self) {
        self.stop();
    }
}

impl RouterInner {
    fn emit(&self, event: RouterEvent) {
        if self.events.send(event).is_err() {
            log::debug!("Router event receiver gone");
        }
    }

    fn run(&self) {
        let mut triggered = false;
        while self.enabled.load(Ordering::SeqCst) {
            if self.config.msg_forward || triggered {
                self.run_pass();
            }
            triggered = match self.wakeup.recv_timeout(self.config.msg_flush) {
                Ok(()) => {
                    while self.wakeup.try_recv().is_ok() {}
                    true
                }
                Err(RecvTimeoutError::Timeout) => false,
                Err(RecvTimeoutError::Disconnected) => break,
            };
        }
        log::info!("Message router thread exiting");
    }

    fn run_pass(&self) {
        let start = Instant::now();
        metrics::counter!(metric_defs::ROUTER_PASSES.name).increment(1);

        let queue = match self.get_queue() {
            Ok(queue) => queue,
            Err(e) => {
                log::error!("Unable to read queue: {}", e);
                return;
            }
        };

        if let Err(e) = self.run_one(&queue) {
            log::error!("Fail-safe unlocking messages in queue: {}", e);
            unlock_all(&queue);
        }

        metrics::histogram!(metric_defs::ROUTER_PASS_TIME.name).record(start.elapsed().as_secs_f64() * 1000.0);
    }

    /// Lock every Outbox message not owned by someone else.
    fn get_queue(&self) -> RouterResult<Queue> {
        let mut queue: Queue = Vec::new();
        for file in self.store.list_folder(Folder::Outbox)? {
            if !msg_lock(&file)? {
                log::debug!("Message {} is locked, skipping", file.display());
                continue;
            }

            let dst = match Message::load(&file) {
                Ok(msg) => msg.dst,
                Err(e) => {
                    log::warn!("Unreadable message {}: {}", file.display(), e);
                    String::new()
                }
            };
            if dst.is_empty() {
                msg_unlock(&file);
                continue;
            }

            match queue.iter_mut().find(|(d, _)| *d == dst) {
                Some((_, files)) => files.push(file),
                None => queue.push((dst, vec![file])),
            }
        }
        Ok(queue)
    }

    fn run_one(&self, queue: &Queue) -> RouterResult<()> {
        let plist = self.stations.stations();
        if plist.is_empty() {
            log::info!("Station list was empty");
            unlock_all(queue);
            return Ok(());
        }

        let slist: StationList = plist
            .into_values()
            .flatten()
            .map(|s| (s.call.clone(), s))
            .collect();

        let routes = match &self.config.routes_file {
            Some(path) => RouteTable::load(path)?,
            None => RouteTable::default(),
        };

        for (_, files) in queue {
            for file in files {
                let routed = match self.route_message(file, &slist, &routes) {
                    Ok(routed) => routed,
                    Err(e) => {
                        log::warn!("Unable to route {}: {}", file.display(), e);
                        false
                    }
                };
                if !routed && msg_is_locked(file) {
                    log::debug!("Unlocking message {}", file.display());
                    msg_unlock(file);
                }
            }
        }
        Ok(())
    }

    fn route_message(&self, file: &Path, slist: &StationList, routes: &RouteTable) -> RouterResult<bool> {
        let msg = Message::load(file)?;
        let mycall = self.config.mycall.as_str();

        if msg.dst == mycall {
            log::debug!("Message {} is for me, not routing", file.display());
            return Ok(false);
        }

        let ctx = RouteContext {
            stations: slist,
            routes,
            access: &self.config.email_access,
            ttl: self.config.station_msg_ttl,
            now: Utc::now(),
        };
        let decision = choose_route(&ctx, &mut self.state.lock(), &msg.src, &msg.dst, &msg.path);

        let route = match decision {
            RouteDecision::Route(route) => route,
            RouteDecision::Ping { call, port } => {
                if let Some(port) = port {
                    metrics::counter!(metric_defs::ROUTER_PINGS_SENT.name).increment(1);
                    self.emit(RouterEvent::PingStation { call, port });
                }
                return Ok(false);
            }
            RouteDecision::NoRoute => return Ok(false),
        };

        if is_wl2k(&route) {
            self.route_via_wl2k(&msg.src, &route, file)
        } else if msg.src.contains('@') && msg.dst.contains('@') {
            Ok(false)
        } else if route.contains('@') {
            if msg.path_ends_with(&[EMAIL_PATH_TAG, mycall]) {
                Ok(false)
            } else {
                self.route_via_email(&msg, file)
            }
        } else {
            Ok(self.route_via_station(&msg.dst, &route, slist, file))
        }
    }

    fn route_via_station(&self, dst: &str, route: &str, slist: &StationList, file: &Path) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock();

        if state.sent_recently(route, now) {
            log::info!("Call {} is busy", route);
            metrics::counter!(metric_defs::ROUTER_SKIPPED_BUSY.name).increment(1);
            return false;
        }
        let Some(port) = slist.get(route).map(|s| s.port.clone()) else {
            return false;
        };
        if !state.port_free(&port) {
            log::info!("Port {} is busy", port);
            metrics::counter!(metric_defs::ROUTER_SKIPPED_BUSY.name).increment(1);
            return false;
        }

        log::info!("Sending {} to {} (via {})", file.display(), dst, route);
        state.record_send(route, &port, file, now);
        drop(state);

        metrics::counter!(metric_defs::ROUTER_MESSAGES_ROUTED.name, "method" => "station").increment(1);
        self.emit(RouterEvent::SendForm {
            call: route.to_string(),
            port,
            path: file.to_path_buf(),
        });
        true
    }

    fn route_via_email(&self, msg: &Message, file: &Path) -> RouterResult<bool> {
        let Some(gateway) = &self.email else {
            log::warn!("No email gateway for {}", msg.dst);
            return Ok(false);
        };
        gateway.send_email(msg)?;
        metrics::counter!(metric_defs::ROUTER_MESSAGES_ROUTED.name, "method" => "email").increment(1);
        self.emit(RouterEvent::FormSent {
            path: file.to_path_buf(),
        });
        Ok(true)
    }

    fn route_via_wl2k(&self, src: &str, dst: &str, file: &Path) -> RouterResult<bool> {
        let Some(gateway) = &self.wl2k else {
            log::warn!("No WL2K gateway for {}", dst);
            return Ok(false);
        };
        let address = dst
            .split_once(':')
            .map(|(_, addr)| addr)
            .ok_or_else(|| RouterError::NoRoute(dst.to_string()))?;
        gateway.send_wl2k(src, address, file)?;
        metrics::counter!(metric_defs::ROUTER_MESSAGES_ROUTED.name, "method" => "wl2k").increment(1);
        Ok(true)
    }

    fn form_xfer_done(&self, file: &Path, port: &str, failed: bool) -> RouterResult<()> {
        log::info!("File {} on {} done", file.display(), port);

        let (call, giving_up) = {
            let mut state = self.state.lock();
            let call = state.finish_send(file, port);
            let mut giving_up = false;
            if let Some(call) = &call {
                if failed {
                    metrics::counter!(metric_defs::ROUTER_ROUTE_FAILURES.name).increment(1);
                    giving_up = state.station_failed(call) == FAILURE_LIMIT;
                } else {
                    state.station_succeeded(call);
                }
            }
            (call, giving_up)
        };

        // The path is stamped while the send still owns the file.
        let stamped = match &call {
            Some(call) if !failed => add_path_element(file, call),
            _ => Ok(()),
        };
        if msg_is_locked(file) {
            msg_unlock(file);
        }

        if let Some(call) = call.filter(|_| giving_up) {
            self.emit(RouterEvent::GivingUp { call });
        }
        stamped?;
        Ok(())
    }
}

fn unlock_all(queue: &Queue) {
    for (_, files) in queue {
        for file in files {
            if msg_is_locked(file) {
                log::debug!("Unlocking {}", file.display());
                msg_unlock(file);
            }
        }
    }
}
