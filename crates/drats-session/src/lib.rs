//! Session Coordination
//!
//! The session manager multiplexes many logical sessions over one radio
//! link. Most are discrete transfers (a file, a form, a forwarded TCP
//! stream) that need a thread of their own to drive a blocking transfer
//! primitive. The [`SessionCoordinator`] listens for session notices,
//! starts one [`SessionWorker`] per transfer session, and reports progress
//! and outcomes as [`CoordinatorEvent`]s on a channel.
//!
//! ```text
//! Started -> Transferring -> Completed -> Ended
//!                         -> Failed    -> Ended
//! ```
//!
//! Session ids 0-3 (control, chat, sniff, RPC) are always-on infrastructure
//! and are never handed to a worker.
//!
//! # Example
//!
//! ```rust,ignore
//! use drats_session::{CoordinatorConfig, SessionCoordinator};
//!
//! let (tx, rx) = crossbeam_channel::unbounded();
//! let coord = SessionCoordinator::new(CoordinatorConfig::default(), manager, store, tx);
//! coord.create_socket_listener(2323, 23, "KK7DS")?;
//! coord.send_form("KK7DS", &path, None)?;
//! for event in rx.iter() {
//!     println!("{:?}", event);
//! }
//! ```

mod bridge;
mod coordinator;
mod error;
mod listener;
mod progress;
mod session;
mod worker;

pub use bridge::*;
pub use coordinator::*;
pub use error::*;
pub use listener::*;
pub use progress::*;
pub use session::*;
pub use worker::*;
