//! Socket connection to an AGW server.
//!
//! Frames are read incrementally: a short read leaves the partial frame
//! buffered so the next call resumes where the last one stopped. The socket
//! read timeout therefore doubles as the poll interval.

use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::constants::*;
use crate::error::{AgwError, AgwResult};
use crate::frame::AgwFrame;

/// AGW connection shared between a data path and AX.25 sessions.
pub type SharedAgw<S = TcpStream> = Arc<Mutex<AgwConnection<S>>>;

/// Client side of an AGW socket.
pub struct AgwConnection<S: Read + Write = TcpStream> {
    stream: S,
    buf: Vec<u8>,
    stash: HashMap<u8, VecDeque<AgwFrame>>,
}

impl AgwConnection<TcpStream> {
    /// Connect to `host:port`. A `timeout` bounds each socket read.
    pub fn connect(host: &str, port: u16, timeout: Option<Duration>) -> AgwResult<Self> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_read_timeout(timeout)?;
        log::info!("Connected to AGW server {}:{}", host, port);
        Ok(Self::new(stream))
    }

    /// Wrap this connection for sharing.
    pub fn into_shared(self) -> SharedAgw {
        Arc::new(Mutex::new(self))
    }
}

impl<S: Read + Write> AgwConnection<S> {
    /// Use an already-open stream.
    pub fn new(stream: S) -> Self {
        AgwConnection {
            stream,
            buf: Vec::with_capacity(AGW_HEADER_SIZE),
            stash: HashMap::new(),
        }
    }

    /// Transmit a frame.
    pub fn send_frame(&mut self, frame: &AgwFrame) -> AgwResult<()> {
        log::trace!("AGW send {}", frame);
        self.stream.write_all(&frame.encode())?;
        self.stream.flush()?;
        Ok(())
    }

    /// Ask the server to forward raw AX.25 frames.
    pub fn enable_raw(&mut self) -> AgwResult<()> {
        self.send_frame(&AgwFrame::new(KIND_ENABLE_RAW))
    }

    /// Read until `size` bytes are buffered.
    ///
    /// Returns `Ok(false)` if the socket timed out first.
    fn fill(&mut self, size: usize) -> AgwResult<bool> {
        let mut chunk = [0u8; 1024];
        while self.buf.len() < size {
            let want = (size - self.buf.len()).min(chunk.len());
            match self.stream.read(&mut chunk[..want]) {
                Ok(0) => {
                    if self.buf.len() >= AGW_HEADER_SIZE {
                        let expected = AgwFrame::declared_len(&self.buf)?;
                        let actual = self.buf.len() - AGW_HEADER_SIZE;
                        self.buf.clear();
                        return Err(AgwError::PayloadLength { expected, actual });
                    }
                    self.buf.clear();
                    return Err(AgwError::Closed);
                }
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    return Ok(false)
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }

    /// Read the next frame of any kind, or `None` if the socket timed out.
    pub fn recv_frame(&mut self) -> AgwResult<Option<AgwFrame>> {
        if !self.fill(AGW_HEADER_SIZE)? {
            return Ok(None);
        }
        let total = AGW_HEADER_SIZE + AgwFrame::declared_len(&self.buf)?;
        if !self.fill(total)? {
            return Ok(None);
        }

        let frame = AgwFrame::decode(&self.buf[..total]);
        self.buf.drain(..total);
        let frame = frame?;
        log::trace!("AGW recv {}", frame);
        Ok(Some(frame))
    }

    /// Receive a frame of `kind`.
    ///
    /// Frames of other kinds that arrive meanwhile are queued and handed out
    /// in arrival order to later callers asking for them. With `poll` set this
    /// keeps reading through timeouts; otherwise a timeout returns `None`.
    pub fn recv_frame_type(&mut self, kind: u8, poll: bool) -> AgwResult<Option<AgwFrame>> {
        loop {
            if let Some(frame) = self.take_stashed(kind) {
                return Ok(Some(frame));
            }
            match self.recv_frame()? {
                Some(frame) if frame.kind == kind => return Ok(Some(frame)),
                Some(frame) => {
                    log::debug!(
                        "Got {} frame while waiting for {}",
                        frame.kind as char,
                        kind as char
                    );
                    self.stash.entry(frame.kind).or_default().push_back(frame);
                }
                None if poll => continue,
                None => return Ok(None),
            }
        }
    }

    /// Pop a queued frame of `kind`.
    pub fn take_stashed(&mut self, kind: u8) -> Option<AgwFrame> {
        self.stash.get_mut(&kind).and_then(VecDeque::pop_front)
    }

    /// Number of queued frames of `kind`.
    pub fn queued(&self, kind: u8) -> usize {
        self.stash.get(&kind).map_or(0, VecDeque::len)
    }

    /// Underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }
}
