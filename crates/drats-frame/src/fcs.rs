//! Checksums: the AX.25 frame check sequence and the CRC-16 used to prefix
//! compressed WL2K payloads.

/// Reflected CCITT polynomial used by the AX.25 FCS.
const FCS_POLY: u16 = 0x8408;

const fn build_fcs_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ FCS_POLY
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// 256-entry lookup table for [`compute_fcs`].
pub static FCS_TABLE: [u16; 256] = build_fcs_table();

/// Compute the AX.25 FCS over `data`.
pub fn compute_fcs(data: &[u8]) -> u16 {
    let mut fcs: u16 = 0xFFFF;
    for &byte in data {
        fcs = (fcs >> 8) ^ FCS_TABLE[((fcs ^ byte as u16) & 0xFF) as usize];
    }
    !fcs
}

/// Append the FCS of `frame` to it, big-endian.
pub fn append_fcs(frame: &mut Vec<u8>) {
    let fcs = compute_fcs(frame);
    frame.extend_from_slice(&fcs.to_be_bytes());
}

/// Check a frame whose last two bytes are a big-endian FCS.
pub fn check_fcs(frame: &[u8]) -> bool {
    if frame.len() < 2 {
        return false;
    }
    let (body, trailer) = frame.split_at(frame.len() - 2);
    compute_fcs(body) == u16::from_be_bytes([trailer[0], trailer[1]])
}

fn update_crc(byte: u8, mut crc: u16) -> u16 {
    let mut c = byte as u16;
    for _ in 0..8 {
        c <<= 1;
        let carry = (c & 0x100) != 0;
        let top = crc & 0x8000 != 0;
        crc = (crc << 1) | carry as u16;
        if top {
            crc ^= 0x1021;
        }
    }
    crc
}

/// CRC-16 (polynomial 0x1021, zero seed, augmented with two zero bytes).
///
/// WL2K peers expect this value little-endian in front of every LZHUF
/// compressed payload.
pub fn calc_checksum(data: &[u8]) -> u16 {
    let crc = data.iter().fold(0u16, |crc, &b| update_crc(b, crc));
    update_crc(0, update_crc(0, crc))
}
