//! Proposed and transferred Winlink messages.

use crate::block::{encode_blocks, read_block_stream};
use crate::compress::Compressor;
use crate::error::{Wl2kError, Wl2kResult};
use crate::link::Conversation;

/// Proposal type for a B2F encapsulated message.
pub const PROPOSAL_TYPE_EMAIL: &str = "EM";

/// A message offered by (or to) a Winlink server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WinLinkMessage {
    id: String,
    kind: String,
    name: String,
    content: Vec<u8>,
    compressed: Vec<u8>,
    size: usize,
    csize: usize,
}

impl WinLinkMessage {
    /// Parse an `FC <type> <id> <usize> <csize> <offset>` proposal.
    pub fn from_proposal(line: &str) -> Wl2kResult<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [fc, kind, id, size, csize, offset] = fields[..] else {
            return Err(Wl2kError::Conversation(format!("bad proposal `{}'", line)));
        };
        if fc != "FC" {
            return Err(Wl2kError::Conversation(format!("bad proposal `{}'", line)));
        }
        let number = |s: &str| {
            s.parse::<usize>()
                .map_err(|_| Wl2kError::Conversation(format!("bad size `{}' in proposal `{}'", s, line)))
        };
        if offset != "0" {
            return Err(Wl2kError::UnsupportedOffset(offset.to_string()));
        }
        Ok(Self {
            id: id.to_string(),
            kind: kind.to_string(),
            size: number(size)?,
            csize: number(csize)?,
            ..Default::default()
        })
    }

    /// Build an outgoing message, compressing `content` for the wire.
    pub fn from_content(id: &str, content: Vec<u8>, name: &str, compressor: &dyn Compressor) -> Wl2kResult<Self> {
        let compressed = compressor.compress(&content)?;
        Ok(Self {
            id: id.to_string(),
            kind: PROPOSAL_TYPE_EMAIL.to_string(),
            name: name.to_string(),
            size: content.len(),
            csize: compressed.len(),
            content,
            compressed,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn proposal(&self) -> String {
        format!("FC {} {} {} {} 0", self.kind, self.id, self.size, self.csize)
    }

    /// Receive this message's block stream and decompress it.
    ///
    /// Size disagreements with the proposal are logged, not fatal.
    pub fn read_from(&mut self, conv: &mut Conversation, compressor: &dyn Compressor) -> Wl2kResult<()> {
        let stream = read_block_stream(conv)?;
        self.name = stream.name;
        self.content = compressor.decompress(&stream.data)?;
        if stream.data.len() != self.csize {
            log::warn!("Compressed size {} != {} for {}", stream.data.len(), self.csize, self.id);
        }
        if self.content.len() != self.size {
            log::warn!("Uncompressed size {} != {} for {}", self.content.len(), self.size, self.id);
        }
        self.compressed = stream.data;
        Ok(())
    }

    /// Send this message's block stream.
    pub fn write_to(&self, conv: &mut Conversation) -> Wl2kResult<()> {
        conv.send_raw(&encode_blocks(&self.name, &self.compressed))
    }
}

/// Checksum line closing a batch of proposals: `F> XX`.
pub fn proposal_checksum_line<'a>(proposals: impl IntoIterator<Item = &'a str>) -> String {
    let sum = proposals
        .into_iter()
        .flat_map(|p| p.bytes().chain(std::iter::once(b'\r')))
        .fold(0u8, |sum, b| sum.wrapping_add(b));
    format!("F> {:02X}", sum.wrapping_neg())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Identity;

    impl Compressor for Identity {
        fn compress(&self, data: &[u8]) -> Wl2kResult<Vec<u8>> {
            Ok(data.to_vec())
        }

        fn decompress(&self, data: &[u8]) -> Wl2kResult<Vec<u8>> {
            Ok(data.to_vec())
        }
    }

    #[test]
    fn test_parse_proposal() {
        let msg = WinLinkMessage::from_proposal("FC EM 123_AB 100 40 0").unwrap();
        assert_eq!(msg.id(), "123_AB");
        assert_eq!(msg.proposal(), "FC EM 123_AB 100 40 0");
    }

    #[test]
    fn test_bad_proposals() {
        assert!(matches!(
            WinLinkMessage::from_proposal("FC EM 123_AB 100 40 17"),
            Err(Wl2kError::UnsupportedOffset(o)) if o == "17"
        ));
        assert!(matches!(
            WinLinkMessage::from_proposal("FC EM 123_AB 100"),
            Err(Wl2kError::Conversation(_))
        ));
        assert!(matches!(
            WinLinkMessage::from_proposal("FC EM 123_AB big 40 0"),
            Err(Wl2kError::Conversation(_))
        ));
        assert!(matches!(
            WinLinkMessage::from_proposal("FA EM 123_AB 100 40 0"),
            Err(Wl2kError::Conversation(_))
        ));
    }

    #[test]
    fn test_from_content() {
        let msg = WinLinkMessage::from_content("MID1", b"twelve bytes".to_vec(), "Subj", &Identity).unwrap();
        assert_eq!(msg.proposal(), "FC EM MID1 12 12 0");
        assert_eq!(msg.name(), "Subj");
    }

    #[test]
    fn test_checksum_line() {
        let proposal = "FC EM MID1 12 12 0";
        let sum: u32 = proposal.bytes().map(u32::from).sum::<u32>() + 13;
        let expected = format!("F> {:02X}", (256 - sum % 256) % 256);
        assert_eq!(proposal_checksum_line([proposal]), expected);
    }
}
