//! Link-layer framing primitives for D-RATS.
//!
//! This crate holds the stateless pieces every radio transport needs before a
//! byte ever reaches the air: KISS escaping between host and TNC, AX.25 bit
//! stuffing, the AX.25 frame check sequence, and callsign/SSID address
//! encoding.
//!
//! # Protocol Overview
//!
//! ## KISS
//!
//! Frames between the host and a TNC are delimited by `FEND` (0xC0). Inside a
//! frame, `FEND` and `FESC` (0xDB) are replaced with two-byte escapes
//! (`FESC TFEND` and `FESC TFESC`). The first byte of every frame is a command
//! byte carrying the TNC port in its high nibble.
//!
//! ```text
//! +------+---------+---------------------+------+
//! | FEND | port<<4 | escaped payload ... | FEND |
//! +------+---------+---------------------+------+
//! ```
//!
//! ## AX.25
//!
//! Addresses are six shifted callsign characters plus one SSID byte; the low
//! bit of the SSID byte marks the final address of the header. A two-byte FCS
//! (CRC-16/X.25, big-endian) trails the frame.
//!
//! # Example
//!
//! ```rust,ignore
//! use drats_frame::{kiss_encode_frame, kiss_recv_frame, compute_fcs};
//!
//! let wire = kiss_encode_frame(b"hello", 0);
//! let (data, rest) = kiss_recv_frame(&wire);
//! assert_eq!(data, b"hello");
//! assert!(rest.is_empty());
//!
//! let fcs = compute_fcs(b"123456789");
//! assert_eq!(fcs, 0x906E);
//! ```

mod address;
mod bitstuff;
mod error;
mod fcs;
mod kiss;

pub use address::*;
pub use bitstuff::*;
pub use error::*;
pub use fcs::*;
pub use kiss::*;
