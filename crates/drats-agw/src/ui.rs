//! Unconnected (UI) frames over AGW raw mode.

use std::io::{Read, Write};

use drats_frame::{encode_path, Callsign, CONTROL_AGW_INFO, PID_NO_LAYER3};

use crate::connection::AgwConnection;
use crate::constants::KIND_RAW;
use crate::error::AgwResult;
use crate::frame::AgwFrame;

/// Build the raw AX.25 body handed to the server in a `K` frame.
///
/// Layout: a zero port byte, the destination address, the source path, the
/// info control byte, the no-layer-3 PID, then `data`.
pub fn encode_ui_payload<S: AsRef<str>>(dcall: &str, spath: &[S], data: &[u8]) -> AgwResult<Vec<u8>> {
    let mut out = vec![0x00];
    out.extend_from_slice(&Callsign::parse(dcall)?.encode(false));
    out.extend(encode_path(spath)?);
    out.push(CONTROL_AGW_INFO);
    out.push(PID_NO_LAYER3);
    out.extend_from_slice(data);
    Ok(out)
}

/// Send `data` as a UI frame to `dcall` from the first entry of `spath`,
/// via the remaining entries.
pub fn transmit_data<R, S>(conn: &mut AgwConnection<R>, dcall: &str, spath: &[S], data: &[u8]) -> AgwResult<()>
where
    R: Read + Write,
    S: AsRef<str>,
{
    let payload = encode_ui_payload(dcall, spath, data)?;
    log::trace!("transmit_data: {}", hex::encode(&payload));
    conn.send_frame(&AgwFrame::new(KIND_RAW).with_payload(payload))
}

/// Payload of the next raw frame, or empty if none arrived.
pub fn receive_data<R: Read + Write>(conn: &mut AgwConnection<R>, blocking: bool) -> AgwResult<Vec<u8>> {
    Ok(conn
        .recv_frame_type(KIND_RAW, blocking)?
        .map(|frame| frame.payload)
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{AGW_HEADER_KIND, AGW_HEADER_SIZE};
    use crate::testing::MockStream;

    #[test]
    fn test_ui_payload_layout() {
        let body = encode_ui_payload("CQ", &["KK7DS", "RELAY"], b"hi").unwrap();
        assert_eq!(body.len(), 1 + 7 + 14 + 2 + 2);
        assert_eq!(body[0], 0x00);
        assert_eq!(body[1], b'C' << 1);
        assert_eq!(body[7], 0x60);
        assert_eq!(body[14] & 1, 0);
        assert_eq!(body[21] & 1, 1);
        assert_eq!(body[22], 0x3E);
        assert_eq!(body[23], 0xF0);
        assert_eq!(&body[24..], b"hi");
    }

    #[test]
    fn test_transmit_data_sends_raw_frame() {
        let mut conn = AgwConnection::new(MockStream::default());
        transmit_data(&mut conn, "CQ", &["KK7DS"], b"x").unwrap();
        let sent = conn.get_ref().take_output();
        assert_eq!(sent[AGW_HEADER_KIND], b'K');
        assert_eq!(sent.len(), AGW_HEADER_SIZE + 1 + 7 + 7 + 2 + 1);
    }

    #[test]
    fn test_transmit_data_rejects_bad_call() {
        let mut conn = AgwConnection::new(MockStream::default());
        assert!(transmit_data(&mut conn, "WAYTOOLONG", &["KK7DS"], b"x").is_err());
        assert!(conn.get_ref().take_output().is_empty());
    }

    #[test]
    fn test_receive_data() {
        let frame = AgwFrame::new(KIND_RAW).with_payload(b"raw".to_vec());
        let mut conn = AgwConnection::new(MockStream::with_input(frame.encode()));
        assert_eq!(receive_data(&mut conn, false).unwrap(), b"raw");
        assert!(receive_data(&mut conn, false).unwrap().is_empty());
    }
}
