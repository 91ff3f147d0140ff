//! End-to-end tests of the `drats` binary.

use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use drats_store::{lock_path, msg_is_locked, msg_lock, Folder, Message, MessageStore};

fn drats(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_drats"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to run drats")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Store plus a config file pointing at it, with `extra` YAML appended.
fn station(dir: &Path, extra: &str) -> (PathBuf, MessageStore) {
    let store_dir = dir.join("store");
    let store = MessageStore::open(&store_dir).unwrap();
    let yaml = format!(
        "callsign: KK7DS\nstore_dir: {}\nemail_spool: {}\n{}",
        store_dir.display(),
        dir.join("spool").display(),
        extra
    );
    let config = dir.join("drats.yaml");
    fs::write(&config, yaml).unwrap();
    (config, store)
}

fn queue(store: &MessageStore, name: &str, msg: Message) -> PathBuf {
    let path = store.folder_path(Folder::Outbox).join(name);
    msg.save(&path).unwrap();
    path
}

#[test]
fn test_missing_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = drats(&dir.path().join("nope.yaml"), &["ports"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unable to read"));
}

#[test]
fn test_ports_lists_entries() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = station(
        dir.path(),
        "ports:\n  - \"True,agwpe:127.0.0.1:8000,,False,False,radio1\"\n  - \"False,net:127.0.0.1:9000,secret,False,False,ratflector\"\n",
    );

    let output = drats(&config, &["ports"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("radio1"), "{}", text);
    assert!(text.contains("ratflector"), "{}", text);
    assert!(text.contains("disabled"), "{}", text);
}

#[test]
fn test_locks_clear() {
    let dir = tempfile::tempdir().unwrap();
    let (config, store) = station(dir.path(), "");
    let file = queue(&store, "a.json", Message::new("1", "KK7DS", "W1AW"));
    assert!(msg_lock(&file).unwrap());

    let output = drats(&config, &["locks", "clear"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Removed 1 lock(s)"));
    assert!(!lock_path(&file).exists());
}

#[test]
fn test_route_to_heard_station() {
    let dir = tempfile::tempdir().unwrap();
    let (config, store) = station(dir.path(), "stations:\n  - { call: W1AW, port: radio1 }\n");
    let file = queue(&store, "a.json", Message::new("1", "KK7DS", "W1AW").with_path(["KK7DS"]));

    let output = drats(&config, &["route"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("for W1AW on radio1"), "{}", stdout(&output));
    assert!(file.exists());
    assert!(!msg_is_locked(&file));
}

#[test]
fn test_route_email_spools_and_files_sent() {
    let dir = tempfile::tempdir().unwrap();
    let (config, store) = station(
        dir.path(),
        "email_access:\n  - \"KK7DS,Both,*@example.com\"\nstations:\n  - { call: W1AW, port: radio1 }\n",
    );
    let file = queue(
        &store,
        "mail.json",
        Message::new("2", "KK7DS", "user@example.com")
            .with_subject("Hello")
            .with_body("hi there")
            .with_path(["KK7DS"]),
    );

    let output = drats(&config, &["route"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    assert!(!file.exists());
    assert!(store.folder_path(Folder::Sent).join("mail.json").exists());
    assert_eq!(fs::read_dir(store.folder_path(Folder::Outbox)).unwrap().count(), 0);

    let spooled: Vec<_> = fs::read_dir(dir.path().join("spool")).unwrap().collect();
    assert_eq!(spooled.len(), 1);
    let text = fs::read_to_string(spooled[0].as_ref().unwrap().path()).unwrap();
    assert!(text.contains("To: user@example.com\r\n"));
    assert!(text.contains("Subject: Hello\r\n"));
}

#[test]
fn test_wl2k_send_failure_unlocks() {
    let dir = tempfile::tempdir().unwrap();
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let (config, store) = station(
        dir.path(),
        &format!(
            "lzhuf_path: {}\nwl2k:\n  server: 127.0.0.1\n  port: {}\n",
            dir.path().join("no-lzhuf").display(),
            port
        ),
    );
    let file = queue(
        &store,
        "w.json",
        Message::new("3", "KK7DS", "WL2K:user@example.com").with_subject("Via winlink"),
    );

    let output = drats(&config, &["wl2k", "send", file.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(file.exists());
    assert!(!msg_is_locked(&file));
}
