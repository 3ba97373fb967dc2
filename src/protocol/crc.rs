//! CRC-8 used to validate packet integrity.
//!
//! Unreflected CRC-8 with polynomial 0x07, initial value 0, no final XOR.
//! Packets carry only the low five bits of the result.

use once_cell::sync::Lazy;

const POLY: u8 = 0x07;

static TABLE: Lazy<[u8; 256]> = Lazy::new(|| {
    let mut table = [0u8; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let mut x = i as u8;
        for _ in 0..8 {
            // Unreflected: shift out of the high bit.
            x = if x & 0x80 != 0 { (x << 1) ^ POLY } else { x << 1 };
        }
        *entry = x;
    }
    table
});

/// Compute the CRC-8 of `data`.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        crc = TABLE[usize::from(crc ^ byte)];
    }
    crc
}
