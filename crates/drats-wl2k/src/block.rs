//! B2F block streams.
//!
//! A compressed message travels as a run of `{kind, length, payload}`
//! blocks: one header naming the message, data blocks of at most
//! [`DATA_CHUNK`] bytes, and an EOF block whose length byte is the
//! two's complement of the data byte sum.

use drats_metrics::{metric_defs, metrics};

use crate::error::{Wl2kError, Wl2kResult};
use crate::link::Conversation;

pub const BLOCK_HDR: u8 = 1;
pub const BLOCK_DAT: u8 = 2;
pub const BLOCK_EOF: u8 = 4;

/// Largest data block we send.
pub const DATA_CHUNK: usize = 128;

fn block_name(kind: u8) -> &'static str {
    match kind {
        BLOCK_HDR => "header",
        BLOCK_DAT => "data",
        BLOCK_EOF => "eof",
        _ => "unknown",
    }
}

/// EOF checksum byte for `data`.
pub fn eof_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |sum, &b| sum.wrapping_add(b)).wrapping_neg()
}

/// Whether `checksum` balances `data` to zero.
pub fn checksum_ok(data: &[u8], checksum: u8) -> bool {
    data.iter().fold(checksum, |sum, &b| sum.wrapping_add(b)) == 0
}

/// Encode a full block stream for one message.
pub fn encode_blocks(name: &str, data: &[u8]) -> Vec<u8> {
    let mut header = Vec::with_capacity(name.len() + 3);
    // The header length is one byte; leave room for "\0" "0" "\0".
    let mut end = name.len().min(u8::MAX as usize - 3);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    header.extend_from_slice(name[..end].as_bytes());
    header.extend_from_slice(b"\x000\x00");

    let mut out = Vec::with_capacity(header.len() + data.len() + data.len() / DATA_CHUNK * 2 + 6);
    out.push(BLOCK_HDR);
    out.push(header.len() as u8);
    out.extend_from_slice(&header);
    for chunk in data.chunks(DATA_CHUNK) {
        out.push(BLOCK_DAT);
        out.push(chunk.len() as u8);
        out.extend_from_slice(chunk);
    }
    out.push(BLOCK_EOF);
    out.push(eof_checksum(data));
    out
}

/// One received message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockStream {
    pub name: String,
    pub offset: String,
    pub data: Vec<u8>,
    pub checksum_ok: bool,
}

/// Read blocks up to and including EOF.
///
/// Bytes that are not a known block kind are skipped. A `*` aborts with
/// the server's error text. A checksum mismatch is logged, not fatal.
pub fn read_block_stream(conv: &mut Conversation) -> Wl2kResult<BlockStream> {
    let mut stream = BlockStream {
        name: String::new(),
        offset: String::new(),
        data: Vec::new(),
        checksum_ok: false,
    };
    let mut pos = 0usize;

    loop {
        let kind = conv.recv_byte()?;
        if kind == b'*' {
            return Err(Wl2kError::Server(conv.recv_available()));
        }
        if !matches!(kind, BLOCK_HDR | BLOCK_DAT | BLOCK_EOF) {
            log::debug!("Got {:#04x} while reading at {}", kind, pos);
            pos += 1;
            continue;
        }
        log::debug!("Found {} block at {}", block_name(kind), pos);
        let size = conv.recv_byte()?;
        pos += 2;

        match kind {
            BLOCK_HDR => {
                let header = conv.recv_exact(size as usize)?;
                let mut fields = header.split(|&b| b == 0);
                stream.name = String::from_utf8_lossy(fields.next().unwrap_or_default()).into_owned();
                stream.offset = String::from_utf8_lossy(fields.next().unwrap_or_default()).into_owned();
                log::info!("Message name is `{}' offset {}", stream.name, stream.offset);
                pos += size as usize;
            }
            BLOCK_DAT => {
                stream.data.extend(conv.recv_exact(size as usize)?);
                pos += size as usize;
            }
            _ => {
                stream.checksum_ok = checksum_ok(&stream.data, size);
                if !stream.checksum_ok {
                    log::warn!(
                        "Checksum mismatch on `{}': EOF byte {:#04x}, expected {:#04x}",
                        stream.name,
                        size,
                        eof_checksum(&stream.data)
                    );
                    metrics::counter!(metric_defs::WL2K_CHECKSUM_MISMATCHES.name).increment(1);
                }
                break;
            }
        }
    }

    log::info!("Got data: {} bytes", stream.data.len());
    Ok(stream)
}
