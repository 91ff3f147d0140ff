//! Data Paths
//!
//! A data path is one configured radio or network endpoint: the byte pipe a
//! session manager reads and writes. Each backend is a variant of
//! [`DataPath`] so the set of transports is closed and every caller handles
//! all of them.
//!
//! | Variant   | Port spec                         | Framing                       |
//! |-----------|-----------------------------------|-------------------------------|
//! | `Serial`  | `/dev/ttyS0` + baud               | none, XON/XOFF flow control   |
//! | `Tnc`     | `tnc:dev[:tncport]` + baud        | KISS                          |
//! | `TncAx25` | `tnc-ax25:dev:tncport:d1;d2`      | KISS + AX.25 UI + FCS         |
//! | `Agw`     | `agwpe:host:port`                 | AGW raw `K` frames            |
//! | `Socket`  | `net:host:port`, `dongle:`        | none, optional USER/PASS login|
//!
//! # Errors
//!
//! [`DataPathError::NotConnected`] is raised when a transport cannot be
//! opened; [`DataPathError::Io`] when an open transport fails. Reads that
//! simply find nothing return an empty buffer.
//!
//! # Example
//!
//! ```rust,ignore
//! use drats_transport::PortConfig;
//!
//! let cfg = PortConfig::parse("True,net:ref.d-rats.com:9000,,False,False,RAT")?;
//! let mut path = cfg.open("KK7DS")?;
//! path.connect()?;
//! path.write(b"hello")?;
//! let reply = path.read_all_waiting()?;
//! ```

mod agw;
mod datapath;
mod error;
mod portspec;
mod serial;
mod socket;
mod tnc;

#[cfg(test)]
mod testing;

pub use agw::*;
pub use datapath::*;
pub use error::*;
pub use portspec::*;
pub use serial::*;
pub use socket::*;
pub use tnc::*;
