//! In-memory stream for exercising the client without a server.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Default)]
struct Inner {
    input: VecDeque<u8>,
    output: Vec<u8>,
    closed: bool,
}

/// Scripted stream. Reads with nothing queued time out unless closed.
#[derive(Clone, Default)]
pub struct MockStream {
    inner: Arc<Mutex<Inner>>,
}

impl MockStream {
    pub fn with_input(data: Vec<u8>) -> Self {
        let stream = Self::default();
        stream.push_input(&data);
        stream
    }

    pub fn push_input(&self, data: &[u8]) {
        self.inner.lock().input.extend(data.iter().copied());
    }

    pub fn close(&self) {
        self.inner.lock().closed = true;
    }

    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut self.inner.lock().output)
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock();
        if inner.input.is_empty() {
            if inner.closed {
                return Ok(0);
            }
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }
        let n = buf.len().min(inner.input.len());
        for (slot, byte) in buf.iter_mut().zip(inner.input.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
