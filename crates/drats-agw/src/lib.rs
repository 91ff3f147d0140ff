//! AGWPE Client
//!
//! This crate speaks the AGW Packet Engine binary protocol: the socket
//! interface that sound-card TNC servers (AGWPE, Direwolf, ldsped, ...) expose
//! as an alternative to a KISS serial link.
//!
//! # Protocol Overview
//!
//! Every message in either direction is a fixed 36-byte header followed by
//! `payload_length` bytes. Integers are little-endian.
//!
//! ```text
//! offset  size  field
//!      0     1  radio port
//!      1     3  reserved
//!      4     1  kind (ASCII letter)
//!      5     1  reserved
//!      6     1  PID
//!      7     1  reserved
//!      8    10  call_from (NUL padded)
//!     18    10  call_to (NUL padded)
//!     28     4  payload_length
//!     32     4  reserved
//! ```
//!
//! A single socket carries replies of many kinds interleaved (connect acks,
//! monitored frames, connected-mode data). [`AgwConnection::recv_frame_type`]
//! stashes frames of other kinds in per-kind queues so that a caller waiting
//! for a connect acknowledgement does not lose data frames and vice versa.
//!
//! # Example
//!
//! ```rust,ignore
//! use drats_agw::{AgwConnection, transmit_data, receive_data};
//!
//! let mut agw = AgwConnection::connect("127.0.0.1", 8000, Some(Duration::from_millis(500)))?;
//! agw.enable_raw()?;
//! transmit_data(&mut agw, "CQ", &["KK7DS"], b"hello")?;
//! let raw = receive_data(&mut agw, false)?;
//! ```

mod ax25;
mod connection;
mod constants;
mod error;
mod frame;
mod ui;

#[cfg(test)]
mod testing;

pub use ax25::*;
pub use connection::*;
pub use constants::*;
pub use error::*;
pub use frame::*;
pub use ui::*;
