//! AGW frame header encoding and decoding.

use std::fmt;

use crate::constants::*;
use crate::error::{AgwError, AgwResult};

/// One AGW protocol message: header fields plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgwFrame {
    /// Radio port on the AGW server.
    pub port: u8,
    /// Frame kind (ASCII letter, see `KIND_*`).
    pub kind: u8,
    /// AX.25 PID.
    pub pid: u8,
    /// Source callsign, NUL padded.
    pub call_from: [u8; AGW_CALL_LEN],
    /// Destination callsign, NUL padded.
    pub call_to: [u8; AGW_CALL_LEN],
    /// Frame body.
    pub payload: Vec<u8>,
}

impl AgwFrame {
    /// Empty frame of the given kind on port 0.
    pub fn new(kind: u8) -> Self {
        AgwFrame {
            port: 0,
            kind,
            pid: 0,
            call_from: [b' '; AGW_CALL_LEN],
            call_to: [b' '; AGW_CALL_LEN],
            payload: Vec::new(),
        }
    }

    /// Builder: set the payload.
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Builder: set the PID.
    pub fn with_pid(mut self, pid: u8) -> Self {
        self.pid = pid;
        self
    }

    /// Builder: set the source callsign.
    pub fn with_from(mut self, call: &str) -> Self {
        self.set_from(call);
        self
    }

    /// Builder: set the destination callsign.
    pub fn with_to(mut self, call: &str) -> Self {
        self.set_to(call);
        self
    }

    /// Set the source callsign (truncated to 9 characters).
    pub fn set_from(&mut self, call: &str) {
        self.call_from = pack_call(call);
    }

    /// Set the destination callsign (truncated to 9 characters).
    pub fn set_to(&mut self, call: &str) {
        self.call_to = pack_call(call);
    }

    /// Source callsign with padding removed.
    pub fn from_call(&self) -> String {
        unpack_call(&self.call_from)
    }

    /// Destination callsign with padding removed.
    pub fn to_call(&self) -> String {
        unpack_call(&self.call_to)
    }

    /// Number of payload bytes.
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Serialize header and payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; AGW_HEADER_SIZE];
        out[0] = self.port;
        out[AGW_HEADER_KIND] = self.kind;
        out[AGW_HEADER_PID] = self.pid;
        out[AGW_HEADER_FROM..AGW_HEADER_FROM + AGW_CALL_LEN].copy_from_slice(&self.call_from);
        out[AGW_HEADER_TO..AGW_HEADER_TO + AGW_CALL_LEN].copy_from_slice(&self.call_to);
        out[AGW_HEADER_LEN..AGW_HEADER_LEN + 4]
            .copy_from_slice(&(self.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Payload length declared by a raw header.
    pub fn declared_len(header: &[u8]) -> AgwResult<usize> {
        if header.len() < AGW_HEADER_SIZE {
            return Err(AgwError::HeaderTooShort {
                actual: header.len(),
            });
        }
        let mut len = [0u8; 4];
        len.copy_from_slice(&header[AGW_HEADER_LEN..AGW_HEADER_LEN + 4]);
        Ok(u32::from_le_bytes(len) as usize)
    }

    /// Parse a complete frame. The payload must match the declared length.
    pub fn decode(data: &[u8]) -> AgwResult<Self> {
        let expected = Self::declared_len(data)?;
        let payload = &data[AGW_HEADER_SIZE..];
        if payload.len() != expected {
            return Err(AgwError::PayloadLength {
                expected,
                actual: payload.len(),
            });
        }

        let mut call_from = [0u8; AGW_CALL_LEN];
        call_from.copy_from_slice(&data[AGW_HEADER_FROM..AGW_HEADER_FROM + AGW_CALL_LEN]);
        let mut call_to = [0u8; AGW_CALL_LEN];
        call_to.copy_from_slice(&data[AGW_HEADER_TO..AGW_HEADER_TO + AGW_CALL_LEN]);

        Ok(AgwFrame {
            port: data[0],
            kind: data[AGW_HEADER_KIND],
            pid: data[AGW_HEADER_PID],
            call_from,
            call_to,
            payload: payload.to_vec(),
        })
    }
}

impl fmt::Display for AgwFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AGW '{}' ({}) port {} {} -> {} [{} bytes]",
            self.kind as char,
            kind_name(self.kind),
            self.port,
            self.from_call(),
            self.to_call(),
            self.payload.len()
        )
    }
}

fn pack_call(call: &str) -> [u8; AGW_CALL_LEN] {
    let mut out = [0u8; AGW_CALL_LEN];
    for (slot, byte) in out.iter_mut().zip(call.bytes().take(AGW_CALL_LEN - 1)) {
        *slot = byte;
    }
    out
}

fn unpack_call(field: &[u8; AGW_CALL_LEN]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let frame = AgwFrame::new(KIND_RAW)
            .with_pid(0xF0)
            .with_from("KK7DS")
            .with_to("CQ")
            .with_payload(b"abc".to_vec());
        let wire = frame.encode();

        assert_eq!(wire.len(), AGW_HEADER_SIZE + 3);
        assert_eq!(wire[AGW_HEADER_KIND], b'K');
        assert_eq!(wire[AGW_HEADER_PID], 0xF0);
        assert_eq!(&wire[8..18], b"KK7DS\0\0\0\0\0");
        assert_eq!(&wire[18..28], b"CQ\0\0\0\0\0\0\0\0");
        assert_eq!(&wire[28..32], &[3, 0, 0, 0]);
        assert_eq!(&wire[36..], b"abc");
    }

    #[test]
    fn test_decode_roundtrip() {
        let frame = AgwFrame::new(KIND_DATA)
            .with_from("N0CALL-1")
            .with_to("W1AW")
            .with_payload(b"hello".to_vec());
        let decoded = AgwFrame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.from_call(), "N0CALL-1");
        assert_eq!(decoded.to_call(), "W1AW");
    }

    #[test]
    fn test_long_call_truncated_to_nine() {
        let mut frame = AgwFrame::new(KIND_CONNECT);
        frame.set_from("ABCDEFGHIJKL");
        assert_eq!(&frame.call_from, b"ABCDEFGHI\0");
        assert_eq!(frame.from_call(), "ABCDEFGHI");
    }

    #[test]
    fn test_default_calls_are_blank() {
        let frame = AgwFrame::new(KIND_VERSION);
        assert_eq!(frame.call_from, [b' '; AGW_CALL_LEN]);
        assert_eq!(frame.from_call(), "");
    }

    #[test]
    fn test_decode_rejects_short_header() {
        assert!(matches!(
            AgwFrame::decode(&[0u8; 20]),
            Err(AgwError::HeaderTooShort { actual: 20 })
        ));
    }

    #[test]
    fn test_decode_rejects_length_mismatch() {
        let mut wire = AgwFrame::new(KIND_RAW).with_payload(b"abcd".to_vec()).encode();
        wire.truncate(AGW_HEADER_SIZE + 2);
        assert!(matches!(
            AgwFrame::decode(&wire),
            Err(AgwError::PayloadLength {
                expected: 4,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_display() {
        let frame = AgwFrame::new(KIND_RAW).with_from("A").with_to("B");
        assert_eq!(frame.to_string(), "AGW 'K' (raw) port 0 A -> B [0 bytes]");
    }
}
