//! End-to-end routing passes over a real message store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::{unbounded, Receiver};
use drats_router::*;
use drats_store::{msg_is_locked, msg_lock, msg_unlock, Folder, Message, MessageKind, MessageStore};
use parking_lot::Mutex;

const MYCALL: &str = "KK7DS";

struct Stations(Mutex<HashMap<String, Vec<HeardStation>>>);

impl Stations {
    fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(HashMap::new())))
    }

    fn heard(&self, call: &str, port: &str) {
        self.0
            .lock()
            .entry(port.to_string())
            .or_default()
            .push(HeardStation::new(call, port, Utc::now()));
    }
}

impl StationSource for Stations {
    fn stations(&self) -> HashMap<String, Vec<HeardStation>> {
        self.0.lock().clone()
    }
}

#[derive(Default)]
struct Mailer {
    sent: Mutex<Vec<String>>,
}

impl EmailGateway for Mailer {
    fn send_email(&self, msg: &Message) -> RouterResult<()> {
        self.sent.lock().push(msg.dst.clone());
        Ok(())
    }
}

#[derive(Default)]
struct Winlink {
    sent: Mutex<Vec<(String, String)>>,
}

impl Wl2kGateway for Winlink {
    fn send_wl2k(&self, src: &str, address: &str, _path: &Path) -> RouterResult<()> {
        self.sent.lock().push((src.to_string(), address.to_string()));
        Ok(())
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    store: MessageStore,
    stations: Arc<Stations>,
    mailer: Arc<Mailer>,
    winlink: Arc<Winlink>,
    router: MessageRouter,
    events: Receiver<RouterEvent>,
}

fn harness(config: RouterConfig) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = MessageStore::open(dir.path()).unwrap();
    let stations = Stations::new();
    let mailer = Arc::new(Mailer::default());
    let winlink = Arc::new(Winlink::default());
    let (tx, rx) = unbounded();
    let router = MessageRouter::new(config, store.clone(), stations.clone(), tx)
        .with_email(mailer.clone())
        .with_wl2k(winlink.clone());
    Harness {
        _dir: dir,
        store,
        stations,
        mailer,
        winlink,
        router,
        events: rx,
    }
}

fn config() -> RouterConfig {
    RouterConfig {
        mycall: MYCALL.into(),
        email_access: EmailAccess::from_specs(&["KK7DS,Outgoing,*@example.com"]),
        ..Default::default()
    }
}

impl Harness {
    fn queue(&self, name: &str, msg: Message) -> PathBuf {
        let file = self.store.folder_path(Folder::Outbox).join(name);
        msg.save(&file).unwrap();
        file
    }

    fn drain(&self) -> Vec<RouterEvent> {
        self.events.try_iter().collect()
    }

    fn send_forms(&self) -> Vec<(String, String)> {
        self.drain()
            .into_iter()
            .filter_map(|e| match e {
                RouterEvent::SendForm { call, port, .. } => Some((call, port)),
                _ => None,
            })
            .collect()
    }
}

#[test]
fn test_direct_station_send() {
    let h = harness(config());
    h.stations.heard("W1AW", "P1");
    h.stations.heard("K7ABC", "P1");
    h.stations.heard("N0OTHER", "P2");
    let file = h.queue("a.json", Message::new("1", MYCALL, "W1AW").with_path([MYCALL]));

    h.router.run_pass();

    assert_eq!(h.send_forms(), vec![("W1AW".to_string(), "P1".to_string())]);
    // Held until the transfer reports back.
    assert!(msg_is_locked(&file));

    // A second message for the same call waits for the first, another
    // station on the busy port waits too, and a free port still goes.
    let same_call = h.queue("b.json", Message::new("2", MYCALL, "W1AW").with_path([MYCALL]));
    let same_port = h.queue("c.json", Message::new("3", MYCALL, "K7ABC").with_path([MYCALL]));
    let other_port = h.queue("d.json", Message::new("4", MYCALL, "N0OTHER").with_path([MYCALL]));
    h.router.run_pass();
    assert_eq!(h.send_forms(), vec![("N0OTHER".to_string(), "P2".to_string())]);
    assert!(!msg_is_locked(&same_call));
    assert!(!msg_is_locked(&same_port));
    assert!(msg_is_locked(&other_port));

    h.router.form_xfer_done(&file, "P1", false).unwrap();
    assert!(!msg_is_locked(&file));
    assert_eq!(Message::load(&file).unwrap().path, vec![MYCALL, "W1AW"]);
    assert_eq!(h.router.failures("W1AW"), 0);

    // P1 is free again; the first queued message for it takes the port.
    h.router.run_pass();
    let forms = h.send_forms();
    assert_eq!(forms.len(), 1);
    assert_eq!(forms[0].1, "P1");
}

#[test]
fn test_stamp_never_seen_half_written() {
    let h = harness(config());
    h.stations.heard("W1AW", "P1");
    let file = h.queue("a.json", Message::new("1", MYCALL, "W1AW").with_path([MYCALL]));

    let stop = Arc::new(AtomicBool::new(false));
    let reader = {
        let stop = stop.clone();
        let file = file.clone();
        thread::spawn(move || {
            let mut bad = Vec::new();
            while !stop.load(Ordering::SeqCst) {
                if msg_lock(&file).unwrap() {
                    if let Err(e) = Message::load(&file) {
                        bad.push(e.to_string());
                    }
                    msg_unlock(&file);
                }
            }
            bad
        })
    };

    for _ in 0..200 {
        h.router.run_pass();
        if !h.send_forms().is_empty() {
            h.router.form_xfer_done(&file, "P1", false).unwrap();
        }
    }
    stop.store(true, Ordering::SeqCst);

    let bad = reader.join().unwrap();
    assert!(bad.is_empty(), "reader saw {:?}", bad);
    assert_eq!(Message::load(&file).unwrap().path, vec![MYCALL, "W1AW"]);
}

#[test]
fn test_email_route() {
    let h = harness(config());
    h.stations.heard("W1AW", "P1");
    let file = h.queue(
        "mail.json",
        Message::new("1", MYCALL, "user@example.com")
            .with_kind(MessageKind::Email)
            .with_path([MYCALL]),
    );

    h.router.run_pass();

    assert_eq!(*h.mailer.sent.lock(), vec!["user@example.com".to_string()]);
    let events = h.drain();
    assert_eq!(events, vec![RouterEvent::FormSent { path: file }]);
}

struct DownMailer;

impl EmailGateway for DownMailer {
    fn send_email(&self, _msg: &Message) -> RouterResult<()> {
        Err(RouterError::Gateway("connection refused".into()))
    }
}

#[test]
fn test_email_failure_leaves_message_queued() {
    let dir = tempfile::tempdir().unwrap();
    let store = MessageStore::open(dir.path()).unwrap();
    let stations = Stations::new();
    stations.heard("W1AW", "P1");
    let (tx, rx) = unbounded();
    let router = MessageRouter::new(config(), store.clone(), stations, tx).with_email(Arc::new(DownMailer));

    let file = store.folder_path(Folder::Outbox).join("mail.json");
    Message::new("1", MYCALL, "user@example.com")
        .with_kind(MessageKind::Email)
        .with_path([MYCALL])
        .save(&file)
        .unwrap();

    router.run_pass();

    assert!(file.exists());
    assert!(!msg_is_locked(&file));
    let events: Vec<_> = rx.try_iter().collect();
    assert!(
        !events.iter().any(|e| matches!(e, RouterEvent::FormSent { .. })),
        "{:?}",
        events
    );
    assert_eq!(store.list_folder(Folder::Outbox).unwrap(), vec![file]);
}

#[test]
fn test_email_not_bounced_back_out() {
    let h = harness(config());
    h.stations.heard("W1AW", "P1");
    h.queue(
        "bounce.json",
        Message::new("1", "a@example.com", "user@example.com").with_path(["a@example.com"]),
    );
    h.queue(
        "looped.json",
        Message::new("2", MYCALL, "user@example.com").with_path([MYCALL, "EMAIL", MYCALL]),
    );

    h.router.run_pass();
    assert!(h.mailer.sent.lock().is_empty());
}

#[test]
fn test_gratuitous_route_next_hop() {
    let h = harness(config());
    h.stations.heard("A", "P1");
    h.stations.heard("B", "P1");
    h.stations.heard("C", "P1");
    h.queue("g.json", Message::new("1", "SRC", "A;B;C").with_path(["SRC", "A"]));

    h.router.run_pass();
    assert_eq!(h.send_forms(), vec![("B".to_string(), "P1".to_string())]);
}

#[test]
fn test_failed_station_skipped_until_success() {
    let h = harness(config());
    h.stations.heard("W1AW", "P1");
    let file = h.queue("a.json", Message::new("1", MYCALL, "W1AW").with_path([MYCALL]));

    for attempt in 1..=3 {
        h.router.run_pass();
        assert_eq!(h.send_forms().len(), 1, "attempt {}", attempt);
        h.router.form_xfer_done(&file, "P1", true).unwrap();
    }
    assert_eq!(h.router.failures("W1AW"), 3);
    assert!(h
        .drain()
        .contains(&RouterEvent::GivingUp { call: "W1AW".into() }));

    h.router.run_pass();
    assert!(h.send_forms().is_empty());
    assert!(!msg_is_locked(&file));
}

#[test]
fn test_own_call_never_dispatched() {
    let mut cfg = config();
    let dir = tempfile::tempdir().unwrap();
    let routes = dir.path().join("routes.txt");
    std::fs::write(&routes, "* GW P1\n").unwrap();
    cfg.routes_file = Some(routes);

    let h = harness(cfg);
    h.stations.heard(MYCALL, "P1");
    h.stations.heard("GW", "P1");
    let file = h.queue("me.json", Message::new("1", "W1AW", MYCALL).with_path(["W1AW"]));

    for _ in 0..3 {
        h.router.run_pass();
        assert!(h.drain().is_empty());
    }
    assert!(!msg_is_locked(&file));
}

#[test]
fn test_wl2k_route() {
    let h = harness(config());
    h.stations.heard("W1AW", "P1");
    h.queue(
        "w.json",
        Message::new("1", MYCALL, "WL2K:bob@winlink.org").with_path([MYCALL]),
    );

    h.router.run_pass();
    assert_eq!(
        *h.winlink.sent.lock(),
        vec![(MYCALL.to_string(), "bob@winlink.org".to_string())]
    );
}

#[test]
fn test_locked_and_empty_messages_skipped() {
    let h = harness(config());
    h.stations.heard("W1AW", "P1");
    let held = h.queue("held.json", Message::new("1", MYCALL, "W1AW"));
    msg_lock(&held).unwrap();
    let blank = h.queue("blank.json", Message::new("2", MYCALL, ""));
    std::fs::write(h.store.folder_path(Folder::Outbox).join("junk.json"), "garbage").unwrap();

    h.router.run_pass();
    assert!(h.send_forms().is_empty());
    assert!(msg_is_locked(&held));
    assert!(!msg_is_locked(&blank));
}

#[test]
fn test_stale_station_pinged() {
    let h = harness(RouterConfig {
        station_msg_ttl: Duration::from_secs(0),
        ..config()
    });
    h.stations.0.lock().insert(
        "P1".into(),
        vec![HeardStation::new("W1AW", "P1", Utc::now() - chrono::Duration::hours(1))],
    );
    let file = h.queue("a.json", Message::new("1", MYCALL, "W1AW"));

    h.router.run_pass();
    assert_eq!(
        h.drain(),
        vec![RouterEvent::PingStation {
            call: "W1AW".into(),
            port: "P1".into()
        }]
    );
    assert!(!msg_is_locked(&file));
}

#[test]
fn test_thread_trigger_and_stop() {
    let h = harness(RouterConfig {
        msg_forward: false,
        msg_flush: Duration::from_secs(60),
        ..config()
    });
    h.stations.heard("W1AW", "P1");

    h.router.start().unwrap();
    assert!(h.router.is_running());
    h.queue("a.json", Message::new("1", MYCALL, "W1AW"));
    h.router.trigger().unwrap();

    let event = h.events.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(matches!(event, RouterEvent::SendForm { .. }));

    h.router.stop();
    assert!(!h.router.is_running());
    h.router.release_pending();
    assert!(!msg_is_locked(&h.store.folder_path(Folder::Outbox).join("a.json")));
}
