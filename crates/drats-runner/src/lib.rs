//! D-RATS Station Runner
//!
//! Headless front end tying the port, store, router and Winlink crates
//! together behind one YAML configuration file.
//!
//! | Command            | Does                                                |
//! |--------------------|-----------------------------------------------------|
//! | `ports`            | list configured ports and their transports          |
//! | `monitor <port>`   | dump raw traffic from one port                      |
//! | `route [--watch]`  | route queued outbox messages once, or until Ctrl-C  |
//! | `wl2k fetch`       | download our Winlink mail into the store            |
//! | `wl2k send <file>` | send one stored message through Winlink             |
//! | `locks clear`      | remove stale message locks                          |
//!
//! Station sends chosen by the router need a session manager on a live
//! port. Without one the runner reports them and releases their locks when
//! it stops; email and Winlink sends complete here.
//!
//! # Example
//!
//! ```rust,ignore
//! use drats_runner::{Config, Station};
//!
//! let config = Config::load("drats.yaml".as_ref())?;
//! let mut station = Station::build(&config)?;
//! station.route_once()?;
//! ```

mod commands;
mod config;
mod error;
mod gateways;
mod logging;
mod stations;

pub use commands::*;
pub use config::*;
pub use error::*;
pub use gateways::*;
pub use logging::*;
pub use stations::*;
