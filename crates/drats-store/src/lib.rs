//! Message Store
//!
//! Queued messages live as files in sibling folders (`Inbox`, `Outbox`,
//! `Sent`, `Trash`) under a store root. The router, session workers and mail
//! gateways all work the same directories, possibly from different
//! processes, so ownership of a message is decided by a sidecar lock file
//! rather than any in-memory state:
//!
//! ```text
//! Outbox/
//!   form_01022024_101500.json
//!   .lock.form_01022024_101500.json   <- held by whoever is sending it
//! ```
//!
//! Lock files are created with exclusive-create semantics, so
//! [`msg_lock`] succeeds for exactly one caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use drats_store::{Folder, Message, MessageStore, msg_lock, msg_unlock};
//!
//! let store = MessageStore::open("/var/lib/drats/messages")?;
//! for file in store.list_folder(Folder::Outbox)? {
//!     if msg_lock(&file)? {
//!         let msg = Message::load(&file)?;
//!         println!("{} -> {}", msg.src, msg.dst);
//!         msg_unlock(&file);
//!     }
//! }
//! ```

mod error;
mod folder;
mod lock;
mod message;

pub use error::*;
pub use folder::*;
pub use lock::*;
pub use message::*;
