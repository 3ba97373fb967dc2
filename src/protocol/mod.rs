//! Wire protocol for the Viiiiva config characteristic.
//!
//! Defines the packet format, burst sequencing, directory layout, and the
//! CRC and timestamp primitives they share.
//!
//! ## Packet Format
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Seqno/CRC (1) │ Payload len (1) │ Sender (1) │ Receiver (1)  │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Command ID (2, LE) │ Payload (0..14)                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The first byte packs a 3-bit sequence number (high bits) with the low
//! five bits of a CRC-8 computed over the rest of the frame. All multi-byte
//! fields are little-endian.

mod burst;
mod crc;
mod directory;
pub mod endian;
mod packet;
pub mod time;

pub use burst::Burst;
pub use crc::crc8;
pub use directory::{Directory, DIRECTORY_RECORD_LENGTH};
pub use packet::{
    acknowledgement, next_seqno, seqno_matches, Packet, MAX_PACKET_LENGTH, MAX_PAYLOAD_LENGTH,
    MIN_PACKET_LENGTH, SEQNO_END,
};

use uuid::Uuid;

/// GATT service the Viiiiva advertises for its config protocol.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x5B774111_D526_7B9A_4AE7_E59D015D79ED);

/// GATT characteristic carrying config packets, in both directions.
pub const CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x5B774321_D526_7B9A_4AE7_E59D015D79ED);

/// Host → device command to download a file or the directory.
pub const CMD_DOWNLOAD: u16 = 0x010b;

/// Device → host reply burst after a download command.
pub const CMD_DOWNLOAD_REPLY: u16 = 0x030b;

/// Host → device command to erase a file.
pub const CMD_ERASE: u16 = 0x040b;

/// Device → host reply after an erase command.
pub const CMD_ERASE_REPLY: u16 = 0x050b;

/// Host → device command to set the device clock.
pub const CMD_SET_TIME: u16 = 0x0108;

/// File index of the directory itself.
pub const DIRECTORY_INDEX: u16 = 0;
