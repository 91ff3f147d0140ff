//! Scripted serial link for tests.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::serial::SerialLink;

struct Inner {
    input: VecDeque<u8>,
    output: Vec<u8>,
    writes: Vec<usize>,
    timeout: Duration,
}

impl Default for Inner {
    fn default() -> Self {
        Inner {
            input: VecDeque::new(),
            output: Vec::new(),
            writes: Vec::new(),
            timeout: Duration::from_millis(250),
        }
    }
}

/// Serial link backed by in-memory buffers. Reads with nothing queued time
/// out immediately.
#[derive(Clone, Default)]
pub struct MockSerial {
    inner: Arc<Mutex<Inner>>,
}

impl MockSerial {
    pub fn push_input(&self, data: &[u8]) {
        self.inner.lock().input.extend(data.iter().copied());
    }

    pub fn written(&self) -> Vec<u8> {
        self.inner.lock().output.clone()
    }

    pub fn writes(&self) -> Vec<usize> {
        self.inner.lock().writes.clone()
    }
}

impl Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock();
        if inner.input.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "serial timeout"));
        }
        let n = buf.len().min(inner.input.len());
        for (slot, byte) in buf.iter_mut().zip(inner.input.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock();
        inner.output.extend_from_slice(buf);
        inner.writes.push(buf.len());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialLink for MockSerial {
    fn bytes_to_read(&self) -> io::Result<usize> {
        Ok(self.inner.lock().input.len())
    }

    fn timeout(&self) -> Duration {
        self.inner.lock().timeout
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.inner.lock().timeout = timeout;
        Ok(())
    }
}
