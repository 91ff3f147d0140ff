//! AX.25 bit stuffing.
//!
//! Input bits are consumed least-significant first and shifted into the
//! output register from the right, so the first bit on the wire ends up as
//! the most-significant bit of the first output byte. A zero is inserted
//! after every run of five one-bits; the run counter carries across byte
//! boundaries. The final partial byte is padded with zero bits.

/// Consecutive one-bits after which a zero is stuffed.
pub const STUFF_RUN: u8 = 5;

/// Incremental bit stuffer.
#[derive(Debug, Default)]
pub struct BitStuffer {
    register: u8,
    bits: u8,
    ones: u8,
    outbound: Vec<u8>,
}

impl BitStuffer {
    /// Create an empty stuffer.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self) {
        self.outbound.push(self.register);
        self.register = 0;
        self.bits = 0;
    }

    fn store_raw(&mut self, bit: bool) {
        self.register = (self.register << 1) | bit as u8;
        self.bits += 1;
        if self.bits == 8 {
            self.push();
        }
    }

    /// Feed one data bit.
    pub fn store_bit(&mut self, bit: bool) {
        self.store_raw(bit);
        if bit {
            self.ones += 1;
            if self.ones == STUFF_RUN {
                self.store_raw(false);
                self.ones = 0;
            }
        } else {
            self.ones = 0;
        }
    }

    /// Feed the eight bits of `byte`, LSB first.
    pub fn store_byte(&mut self, byte: u8) {
        for bit in 0..8 {
            self.store_bit(byte & (1 << bit) != 0);
        }
    }

    /// Pad the final byte with zeros and return the stuffed stream.
    pub fn finish(mut self) -> Vec<u8> {
        while self.bits != 0 {
            self.store_raw(false);
        }
        self.outbound
    }
}

/// Bit-stuff `data`.
pub fn bitstuff(data: &[u8]) -> Vec<u8> {
    let mut ctx = BitStuffer::new();
    for &byte in data {
        ctx.store_byte(byte);
    }
    ctx.finish()
}

/// Undo [`bitstuff`], discarding stuffed zeros and the trailing padding.
pub fn bitunstuff(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut current = 0u8;
    let mut filled = 0u8;
    let mut ones = 0u8;

    for &byte in data {
        for pos in (0..8).rev() {
            let bit = byte & (1 << pos) != 0;
            if ones == STUFF_RUN {
                // Stuffed zero; drop it.
                ones = 0;
                continue;
            }
            if bit {
                ones += 1;
                current |= 1 << filled;
            } else {
                ones = 0;
            }
            filled += 1;
            if filled == 8 {
                out.push(current);
                current = 0;
                filled = 0;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stuff_zero_byte() {
        assert_eq!(bitstuff(&[0x00]), vec![0x00]);
    }

    #[test]
    fn test_stuff_all_ones() {
        // 11111 0 111 | 1 + padding
        assert_eq!(bitstuff(&[0xFF]), vec![0xFB, 0x80]);
    }

    #[test]
    fn test_stuff_five_ones_then_zeros() {
        // LSB-first bits of 0x1F are 11111000; a zero follows the run.
        assert_eq!(bitstuff(&[0x1F]), vec![0xF8, 0x00]);
    }

    #[test]
    fn test_run_carries_across_bytes() {
        // 0xE0 ends with three ones, 0x03 starts with two: a stuff is due.
        let stuffed = bitstuff(&[0xE0, 0x03]);
        assert_eq!(stuffed.len(), 3);
        assert_eq!(bitunstuff(&stuffed), vec![0xE0, 0x03]);
    }

    #[test]
    fn test_roundtrip_ones_runs() {
        let cases: Vec<Vec<u8>> = vec![
            vec![],
            vec![0xFF; 16],
            vec![0x7E, 0x7E, 0x7E],
            vec![0x1F, 0xF8, 0x3E, 0x7C],
            (0..=255u8).collect(),
        ];
        for data in cases {
            assert_eq!(bitunstuff(&bitstuff(&data)), data, "case {:02x?}", data);
        }
    }

    #[test]
    fn test_no_six_ones_on_wire() {
        let stuffed = bitstuff(&[0xFF; 8]);
        let mut run = 0;
        for byte in stuffed {
            for pos in (0..8).rev() {
                if byte & (1 << pos) != 0 {
                    run += 1;
                    assert!(run <= 5);
                } else {
                    run = 0;
                }
            }
        }
    }
}
