//! Winlink 2000 Gateway
//!
//! Client side of the B2F forwarding protocol, used to fetch mail from
//! and post mail to the Winlink system.
//!
//! | Link                 | Transport                         | Login                          |
//! |----------------------|-----------------------------------|--------------------------------|
//! | [`TelnetLink`]       | TCP to a Common Message Server    | callsign, `CMSTELNET`, challenge |
//! | [`RmsLink`]          | AX.25 via AGW to an RMS gateway   | banner exchange                |
//!
//! A session after login:
//!
//! ```text
//! fetch:  FF -> FC ... F>  ->  FS YY..  -> block streams -> FQ
//! send:   FC ... F> XX     ->  FS Y     -> block stream
//! ```
//!
//! Message content is LZHUF compressed by an external program
//! ([`LzhufProcess`]); tests substitute any [`Compressor`].
//!
//! # Example
//!
//! ```rust,ignore
//! use drats_wl2k::{LzhufProcess, TelnetLink, Wl2kClient};
//!
//! let link = TelnetLink::new("KK7DS", DEFAULT_SERVER, DEFAULT_PORT, "");
//! let mut client = Wl2kClient::new(link, Arc::new(LzhufProcess::new("lzhuf")));
//! let count = client.get_messages()?;
//! for msg in client.messages() {
//!     println!("{}: {} bytes", msg.id(), msg.content().len());
//! }
//! ```

mod block;
mod client;
mod compress;
mod error;
mod link;
mod mail;
mod message;
mod worker;

pub use block::*;
pub use client::*;
pub use compress::*;
pub use error::*;
pub use link::*;
pub use mail::*;
pub use message::*;
pub use worker::*;
