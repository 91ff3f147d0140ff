//! KISS framing between the host and a TNC.

use bytes::BytesMut;
use log::{debug, trace};

use crate::error::{FrameError, FrameResult};

/// Frame delimiter.
pub const FEND: u8 = 0xC0;
/// Escape introducer.
pub const FESC: u8 = 0xDB;
/// Escaped `FEND`.
pub const TFEND: u8 = 0xDC;
/// Escaped `FESC`.
pub const TFESC: u8 = 0xDD;

/// Largest read a TNC transport performs in one go.
pub const KISS_READ_SIZE: usize = 1024;

/// Replace `FEND` and `FESC` in `frame` with their two-byte escapes.
pub fn kiss_escape(frame: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.len() + frame.len() / 8 + 2);
    for &byte in frame {
        match byte {
            FEND => out.extend_from_slice(&[FESC, TFEND]),
            FESC => out.extend_from_slice(&[FESC, TFESC]),
            _ => out.push(byte),
        }
    }
    out
}

/// Invert [`kiss_escape`].
///
/// A `FESC` followed by anything other than `TFEND`/`TFESC`, or a dangling
/// `FESC` at the end of the input, is a [`FrameError::BadEscape`].
pub fn kiss_unescape(data: &[u8]) -> FrameResult<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut iter = data.iter();
    while let Some(&byte) = iter.next() {
        if byte != FESC {
            out.push(byte);
            continue;
        }
        match iter.next() {
            Some(&TFEND) => out.push(FEND),
            Some(&TFESC) => out.push(FESC),
            Some(&other) => return Err(FrameError::BadEscape(other)),
            None => return Err(FrameError::BadEscape(FESC)),
        }
    }
    Ok(out)
}

/// Wrap `data` in a complete KISS data frame for the given TNC port.
pub fn kiss_encode_frame(data: &[u8], port: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 4);
    out.push(FEND);
    out.push((port & 0x0F) << 4);
    out.extend_from_slice(&kiss_escape(data));
    out.push(FEND);
    out
}

/// True when `buf` holds at least two delimiters, i.e. possibly a whole frame.
pub fn kiss_buf_has_frame(buf: &[u8]) -> bool {
    buf.iter().filter(|&&b| b == FEND).count() >= 2
}

/// Extract the payload of every complete frame in `buf`.
///
/// Returns `(data, remainder)`. `data` is the concatenation of all complete
/// frame payloads with their command bytes removed. `remainder` starts at the
/// opening `FEND` of an unfinished trailing frame (or is empty) and should be
/// prepended to the next read.
///
/// Bytes outside any frame are dropped with a debug record. A bad escape
/// drops the frame being assembled; parsing resumes at the next `FEND`.
pub fn kiss_recv_frame(buf: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut data = Vec::new();
    let mut frame = Vec::new();
    let mut in_frame = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, &byte) in buf.iter().enumerate() {
        if escaped {
            escaped = false;
            match byte {
                TFEND => frame.push(FEND),
                TFESC => frame.push(FESC),
                other => {
                    debug!("[TNC] Bad escape of 0x{:02x}, dropping frame", other);
                    frame.clear();
                    in_frame = false;
                }
            }
            continue;
        }

        match byte {
            FEND if !in_frame => {
                in_frame = true;
                start = i;
            }
            // Back-to-back delimiters: the second one opens the frame.
            FEND if frame.is_empty() => start = i,
            FEND => {
                data.extend_from_slice(&frame[1..]);
                frame.clear();
                in_frame = false;
            }
            FESC if in_frame => escaped = true,
            _ if in_frame => frame.push(byte),
            _ => debug!("[TNC] Out-of-frame garbage: 0x{:02x}", byte),
        }
    }

    if !data.is_empty() {
        trace!("[TNC] Data: {}", hex::encode(&data));
    }

    let remainder = if in_frame {
        buf[start..].to_vec()
    } else {
        Vec::new()
    };
    (data, remainder)
}

/// Streaming KISS decoder for transports that read in arbitrary chunks.
#[derive(Debug, Default)]
pub struct KissCodec {
    buffer: BytesMut,
}

impl KissCodec {
    /// Create a new codec.
    pub fn new() -> Self {
        KissCodec {
            buffer: BytesMut::with_capacity(KISS_READ_SIZE * 2),
        }
    }

    /// Add received bytes.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Payload bytes from all frames completed so far, if any.
    pub fn decode(&mut self) -> Option<Vec<u8>> {
        if !kiss_buf_has_frame(&self.buffer) {
            if !self.buffer.is_empty() {
                trace!("[TNC] Buffer partially filled ({} b)", self.buffer.len());
            }
            return None;
        }

        let (data, rest) = kiss_recv_frame(&self.buffer);
        self.buffer.clear();
        self.buffer.extend_from_slice(&rest);

        if data.is_empty() {
            None
        } else {
            Some(data)
        }
    }

    /// Number of bytes held for a future frame.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial frame.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
