//! AX.25 callsign/SSID address encoding.

use std::fmt;

use crate::error::{FrameError, FrameResult};
use crate::fcs::append_fcs;

/// Callsign characters in an address field.
pub const CALLSIGN_LEN: usize = 6;
/// Bytes per encoded address (callsign + SSID byte).
pub const ADDRESS_LEN: usize = 7;
/// Highest SSID representable in an address.
pub const MAX_SSID: u8 = 7;

/// Control byte used on frames sent through a KISS TNC.
pub const CONTROL_UI: u8 = 0x03;
/// Control byte used on UI frames handed to an AGW server.
pub const CONTROL_AGW_INFO: u8 = 0x3E;
/// PID: no layer 3 protocol.
pub const PID_NO_LAYER3: u8 = 0xF0;

/// A parsed `CALL-SSID` station address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callsign {
    /// Callsign, space-padded to six characters.
    pub call: String,
    /// Secondary station identifier, 0..=7.
    pub ssid: u8,
}

impl Callsign {
    /// Parse `CALL` or `CALL-N`.
    pub fn parse(text: &str) -> FrameResult<Self> {
        let (call, sid) = match text.split_once('-') {
            Some((call, sid)) => (call, Some(sid)),
            None => (text, None),
        };

        if call.chars().count() > CALLSIGN_LEN {
            return Err(FrameError::CallsignTooLong(call.to_string()));
        }

        let ssid = match sid {
            None => 0,
            Some(sid) => {
                let value: i64 = sid
                    .trim()
                    .parse()
                    .map_err(|_| FrameError::InvalidSsid(sid.to_string()))?;
                if !(0..=MAX_SSID as i64).contains(&value) {
                    return Err(FrameError::SsidOutOfRange(value));
                }
                value as u8
            }
        };

        Ok(Callsign {
            call: format!("{:<width$}", call, width = CALLSIGN_LEN),
            ssid,
        })
    }

    /// Callsign without padding.
    pub fn base(&self) -> &str {
        self.call.trim_end()
    }

    /// Encode as a seven-byte address field entry.
    pub fn encode(&self, last: bool) -> [u8; ADDRESS_LEN] {
        let mut out = [0u8; ADDRESS_LEN];
        for (slot, byte) in out.iter_mut().zip(self.call.bytes()) {
            *slot = byte << 1;
        }
        out[CALLSIGN_LEN] = encode_ssid(self.ssid, last);
        out
    }
}

impl fmt::Display for Callsign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ssid == 0 {
            write!(f, "{}", self.base())
        } else {
            write!(f, "{}-{}", self.base(), self.ssid)
        }
    }
}

/// Split `CALL-SSID` into the padded callsign and SSID.
pub fn ssid(call: &str) -> FrameResult<(String, u8)> {
    let parsed = Callsign::parse(call)?;
    Ok((parsed.call, parsed.ssid))
}

/// Encode an SSID byte; `last` sets the address-extension bit.
pub fn encode_ssid(ssid: u8, last: bool) -> u8 {
    let mask = if last { 0x61 } else { 0x60 };
    ((ssid & 0x0F) << 1) | mask
}

/// Encode a source path: the first entry is the sender, the rest are
/// digipeaters. Only the final entry carries the extension bit. Blank
/// entries are skipped.
pub fn encode_path<S: AsRef<str>>(calls: &[S]) -> FrameResult<Vec<u8>> {
    let calls: Vec<&str> = calls
        .iter()
        .map(|c| c.as_ref().trim())
        .filter(|c| !c.is_empty())
        .collect();

    let mut out = Vec::with_capacity(calls.len() * ADDRESS_LEN);
    for (i, call) in calls.iter().enumerate() {
        let last = i + 1 == calls.len();
        out.extend_from_slice(&Callsign::parse(call)?.encode(last));
    }
    Ok(out)
}

/// Address, control and PID fields of an outgoing AX.25 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ax25Header {
    /// Destination station.
    pub dest: String,
    /// Source followed by digipeaters.
    pub path: Vec<String>,
    /// Control byte.
    pub control: u8,
    /// Protocol identifier.
    pub pid: u8,
}

impl Ax25Header {
    /// Header for a UI frame from `source` via `digis` to `dest`.
    pub fn new(dest: impl Into<String>, source: impl Into<String>, digis: &[String]) -> Self {
        let mut path = vec![source.into()];
        path.extend(digis.iter().cloned());
        Ax25Header {
            dest: dest.into(),
            path,
            control: CONTROL_UI,
            pid: PID_NO_LAYER3,
        }
    }

    /// Use a different control byte.
    pub fn with_control(mut self, control: u8) -> Self {
        self.control = control;
        self
    }

    /// Serialize the header fields.
    pub fn encode(&self) -> FrameResult<Vec<u8>> {
        let mut out = Vec::with_capacity(ADDRESS_LEN * (1 + self.path.len()) + 2);
        out.extend_from_slice(&Callsign::parse(&self.dest)?.encode(false));
        out.extend(encode_path(&self.path)?);
        out.push(self.control);
        out.push(self.pid);
        Ok(out)
    }

    /// Header, payload and trailing FCS.
    pub fn build_frame(&self, payload: &[u8]) -> FrameResult<Vec<u8>> {
        let mut frame = self.encode()?;
        frame.extend_from_slice(payload);
        append_fcs(&mut frame);
        Ok(frame)
    }
}
