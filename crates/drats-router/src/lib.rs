//! Message Router
//!
//! Store-and-forward routing for queued messages. Each pass the router
//! locks what it can of the Outbox, asks for the stations currently heard,
//! and picks a next hop for every message:
//!
//! | Priority | Rule                                           | Next hop          |
//! |----------|------------------------------------------------|-------------------|
//! | 1        | destination is a gratuitous route `A;B;C`      | next unvisited node |
//! | 2        | destination is an email address with access    | email gateway     |
//! | 3        | destination heard directly                     | destination       |
//! | 4        | static route for the destination               | gateway station   |
//! | 5        | default (`*`) route                            | gateway station   |
//! | 6        | destination is `WL2K:address`                  | Winlink gateway   |
//!
//! A candidate already on the message path, failed three times, or stale
//! and unanswered after three pings falls through to the next rule. A
//! stale candidate is pinged and the message waits for a later pass.
//!
//! Messages that are not handed off are unlocked at the end of the pass,
//! so retries happen at most once per flush interval.
//!
//! # Example
//!
//! ```rust,ignore
//! use drats_router::{MessageRouter, RouterConfig};
//!
//! let (tx, rx) = crossbeam_channel::unbounded();
//! let router = MessageRouter::new(RouterConfig::default(), store, stations, tx);
//! router.start()?;
//! for event in rx.iter() {
//!     if let RouterEvent::SendForm { call, port, path } = event {
//!         coordinator.send_form(&call, &path, None)?;
//!     }
//! }
//! ```

mod access;
mod error;
mod policy;
mod router;
mod routes;
mod state;

pub use access::*;
pub use error::*;
pub use policy::*;
pub use router::*;
pub use routes::*;
pub use state::*;
