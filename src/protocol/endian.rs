//! Little-endian field access at byte offsets.
//!
//! The wire format never benefits from struct punning; every multi-byte
//! field goes through these helpers instead. Callers are responsible for
//! buffer sizing.

use byteorder::{ByteOrder, LittleEndian};

/// Read a little-endian u16 at `offset`.
pub fn read_u16(buf: &[u8], offset: usize) -> u16 {
    LittleEndian::read_u16(&buf[offset..offset + 2])
}

/// Read a little-endian u32 at `offset`.
pub fn read_u32(buf: &[u8], offset: usize) -> u32 {
    LittleEndian::read_u32(&buf[offset..offset + 4])
}

/// Write a little-endian u16 at `offset`.
pub fn write_u16(buf: &mut [u8], offset: usize, value: u16) {
    LittleEndian::write_u16(&mut buf[offset..offset + 2], value);
}

/// Write a little-endian u32 at `offset`.
pub fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    LittleEndian::write_u32(&mut buf[offset..offset + 4], value);
}
