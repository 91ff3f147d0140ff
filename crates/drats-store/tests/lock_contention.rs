//! Many actors racing for the same queue.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use drats_store::*;

#[test]
fn test_only_one_thread_wins_each_message() {
    let dir = tempfile::tempdir().unwrap();
    let store = MessageStore::open(dir.path()).unwrap();
    let outbox = store.folder_path(Folder::Outbox);
    for i in 0..20 {
        Message::new(i.to_string(), "KK7DS", "W1AW")
            .save(&outbox.join(format!("m{:02}.json", i)))
            .unwrap();
    }

    let wins = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let wins = wins.clone();
            thread::spawn(move || {
                for file in store.list_folder(Folder::Outbox).unwrap() {
                    if msg_lock(&file).unwrap() {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(wins.load(Ordering::SeqCst), 20);
    assert_eq!(store.clear_all_locks().unwrap(), 20);
}

#[test]
fn test_message_lifecycle_through_folders() {
    let dir = tempfile::tempdir().unwrap();
    let store = MessageStore::open(dir.path()).unwrap();

    let draft = store.new_inbox_name();
    Message::new("1", "KK7DS", "W1AW").save(&draft).unwrap();
    let queued = store.move_to_outgoing(&draft).unwrap();
    assert_eq!(store.list_folder(Folder::Outbox).unwrap(), vec![queued.clone()]);

    add_path_element(&queued, "KK7DS").unwrap();
    let sent = store.move_to_folder(&queued, Folder::Sent).unwrap();
    assert!(store.list_folder(Folder::Outbox).unwrap().is_empty());
    assert_eq!(Message::load(&sent).unwrap().path, vec!["KK7DS"]);
    assert_eq!(fs::read_dir(store.folder_path(Folder::Sent)).unwrap().count(), 1);
}
