//! Connected-mode AX.25 sessions through an AGW server.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use crate::connection::SharedAgw;
use crate::constants::*;
use crate::error::{AgwError, AgwResult};
use crate::frame::AgwFrame;

/// How long to wait for the server to acknowledge a request.
pub const AGW_ACK_TIMEOUT: Duration = Duration::from_secs(30);

/// A connected AX.25 session multiplexed over an AGW socket.
pub struct AgwAx25Connection<S: Read + Write = TcpStream> {
    agw: SharedAgw<S>,
    mycall: String,
    peer: Option<String>,
    inbuf: Vec<u8>,
    ack_timeout: Duration,
}

impl<S: Read + Write> AgwAx25Connection<S> {
    /// Register `mycall` with the server.
    pub fn new(agw: SharedAgw<S>, mycall: &str) -> AgwResult<Self> {
        Self::with_ack_timeout(agw, mycall, AGW_ACK_TIMEOUT)
    }

    /// Register `mycall`, waiting at most `ack_timeout` for each server reply.
    pub fn with_ack_timeout(agw: SharedAgw<S>, mycall: &str, ack_timeout: Duration) -> AgwResult<Self> {
        let conn = AgwAx25Connection {
            agw,
            mycall: mycall.to_string(),
            peer: None,
            inbuf: Vec::new(),
            ack_timeout,
        };
        conn.agw
            .lock()
            .send_frame(&AgwFrame::new(KIND_REGISTER).with_from(mycall))?;
        conn.wait_for(KIND_REGISTER)?;
        log::debug!("Registered {} with AGW server", mycall);
        Ok(conn)
    }

    /// Poll for a frame of `kind`, releasing the socket between reads so
    /// other users of the connection are not starved.
    fn wait_for(&self, kind: u8) -> AgwResult<AgwFrame> {
        let deadline = Instant::now() + self.ack_timeout;
        loop {
            if let Some(frame) = self.agw.lock().recv_frame_type(kind, false)? {
                return Ok(frame);
            }
            if Instant::now() >= deadline {
                return Err(AgwError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no '{}' reply from AGW server", kind as char),
                )));
            }
        }
    }

    /// Open a session to `tocall`.
    pub fn connect(&mut self, tocall: &str) -> AgwResult<()> {
        let frame = AgwFrame::new(KIND_CONNECT)
            .with_from(&self.mycall)
            .with_to(tocall);
        self.agw.lock().send_frame(&frame)?;
        let reply = self.wait_for(KIND_CONNECT)?;
        log::info!(
            "AGW connect {} -> {}: {}",
            self.mycall,
            tocall,
            String::from_utf8_lossy(&reply.payload).trim()
        );
        self.peer = Some(tocall.to_string());
        Ok(())
    }

    /// Close the session.
    pub fn disconnect(&mut self) -> AgwResult<()> {
        let mut frame = AgwFrame::new(KIND_DISCONNECT).with_from(&self.mycall);
        if let Some(peer) = &self.peer {
            frame.set_to(peer);
        }
        self.agw.lock().send_frame(&frame)?;
        let reply = self.wait_for(KIND_DISCONNECT)?;
        log::info!(
            "AGW disconnect: {}",
            String::from_utf8_lossy(&reply.payload).trim()
        );
        self.peer = None;
        Ok(())
    }

    /// Send connected-mode data.
    pub fn send(&mut self, data: &[u8]) -> AgwResult<()> {
        let mut frame = AgwFrame::new(KIND_DATA)
            .with_from(&self.mycall)
            .with_payload(data.to_vec());
        if let Some(peer) = &self.peer {
            frame.set_to(peer);
        }
        self.agw.lock().send_frame(&frame)
    }

    /// Receive up to `length` bytes (all buffered data when 0).
    ///
    /// Waits for at most one data frame when the buffer cannot satisfy the
    /// request.
    pub fn recv(&mut self, length: usize) -> AgwResult<Vec<u8>> {
        if length == 0 || length > self.inbuf.len() {
            if let Some(frame) = self.agw.lock().recv_frame_type(KIND_DATA, false)? {
                self.inbuf.extend_from_slice(&frame.payload);
            }
        }
        let take = if length == 0 {
            self.inbuf.len()
        } else {
            length.min(self.inbuf.len())
        };
        Ok(self.inbuf.drain(..take).collect())
    }

    /// Receive buffered data as text, mapping CR line endings to LF.
    pub fn recv_text(&mut self) -> AgwResult<String> {
        let data = self.recv(0)?;
        Ok(String::from_utf8_lossy(&data).replace('\r', "\n"))
    }

    /// Our registered callsign.
    pub fn mycall(&self) -> &str {
        &self.mycall
    }
}

impl<S: Read + Write> Read for AgwAx25Connection<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.recv(buf.len()).map_err(into_io)?;
        if data.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no AGW data"));
        }
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }
}

impl<S: Read + Write> Write for AgwAx25Connection<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send(buf).map_err(into_io)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn into_io(err: AgwError) -> io::Error {
    match err {
        AgwError::Io(e) => e,
        AgwError::Closed => io::Error::new(io::ErrorKind::UnexpectedEof, "AGW connection closed"),
        other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::connection::AgwConnection;
    use crate::testing::MockStream;

    fn shared(stream: MockStream) -> SharedAgw<MockStream> {
        Arc::new(Mutex::new(AgwConnection::new(stream)))
    }

    fn reply(kind: u8, payload: &[u8]) -> Vec<u8> {
        AgwFrame::new(kind).with_payload(payload.to_vec()).encode()
    }

    #[test]
    fn test_register_connect_and_exchange() {
        let stream = MockStream::default();
        stream.push_input(&reply(KIND_REGISTER, &[1]));
        let agw = shared(stream.clone());
        let mut conn = AgwAx25Connection::new(agw, "KK7DS").unwrap();

        let sent = stream.take_output();
        assert_eq!(sent[AGW_HEADER_KIND], KIND_REGISTER);
        assert_eq!(&sent[8..13], b"KK7DS");

        stream.push_input(&reply(KIND_CONNECT, b"*** CONNECTED With N7AAM-11\r"));
        conn.connect("N7AAM-11").unwrap();
        let sent = stream.take_output();
        assert_eq!(sent[AGW_HEADER_KIND], KIND_CONNECT);
        assert_eq!(&sent[18..26], b"N7AAM-11");

        conn.send(b"hello\r").unwrap();
        let sent = AgwFrame::decode(&stream.take_output()).unwrap();
        assert_eq!(sent.kind, KIND_DATA);
        assert_eq!(sent.payload, b"hello\r");
        assert_eq!(sent.to_call(), "N7AAM-11");

        stream.push_input(&reply(KIND_DATA, b"line1\rline2\r"));
        assert_eq!(conn.recv_text().unwrap(), "line1\nline2\n");
    }

    #[test]
    fn test_recv_length_is_buffered() {
        let stream = MockStream::default();
        stream.push_input(&reply(KIND_REGISTER, &[]));
        stream.push_input(&reply(KIND_DATA, b"abcdef"));
        let mut conn = AgwAx25Connection::new(shared(stream), "KK7DS").unwrap();

        assert_eq!(conn.recv(2).unwrap(), b"ab");
        assert_eq!(conn.recv(3).unwrap(), b"cde");
        assert_eq!(conn.recv(0).unwrap(), b"f");
        assert!(conn.recv(0).unwrap().is_empty());
    }

    #[test]
    fn test_read_times_out_without_data() {
        let stream = MockStream::default();
        stream.push_input(&reply(KIND_REGISTER, &[]));
        let mut conn = AgwAx25Connection::new(shared(stream), "KK7DS").unwrap();
        let mut buf = [0u8; 8];
        let err = conn.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_register_times_out() {
        let stream = MockStream::default();
        let result = AgwAx25Connection::with_ack_timeout(shared(stream), "KK7DS", Duration::from_millis(20));
        assert!(matches!(result, Err(AgwError::Io(e)) if e.kind() == io::ErrorKind::TimedOut));
    }
}
