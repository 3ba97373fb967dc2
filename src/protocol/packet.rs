//! Packet structure and handling.

use crate::error::ProtocolError;

use super::{crc8, endian};

/// Maximum length in bytes of one config packet.
pub const MAX_PACKET_LENGTH: usize = 20;

/// Minimum length in bytes of one config packet (header only).
pub const MIN_PACKET_LENGTH: usize = 6;

/// Maximum number of payload bytes in one packet.
pub const MAX_PAYLOAD_LENGTH: usize = 14;

/// Sequence number of the final packet in a burst, and of single-shot
/// command packets.
pub const SEQNO_END: u8 = 7;

/// Command-id bit set on acknowledgement packets.
const ACK_FLAG: u16 = 0x8000;

/// Value in the sender byte of host-originated packets, and the receiver
/// byte of device-originated ones.
const PEER_HOST: u8 = 3;

/// Value in the sender byte of device-originated packets, and the receiver
/// byte of host-originated ones.
const PEER_DEVICE: u8 = 1;

/// Highest non-terminal sequence number before the cycle wraps back to 1.
const SEQNO_MODULUS: u8 = 6;

/// Byte offsets within the frame.
const OFFSET_PAYLOAD_LENGTH: usize = 1;
const OFFSET_SENDER: usize = 2;
const OFFSET_RECEIVER: usize = 3;
const OFFSET_CMD: usize = 4;
const OFFSET_PAYLOAD: usize = 6;

/// The acknowledgement command id for `cmd`.
pub fn acknowledgement(cmd: u16) -> u16 {
    cmd | ACK_FLAG
}

/// The next non-terminal sequence number after `seqno`.
pub fn next_seqno(seqno: u8) -> u8 {
    (seqno % SEQNO_MODULUS) + 1
}

/// Whether `seqno` continues a burst expecting `expected`. The terminal
/// sequence number matches any expectation.
pub fn seqno_matches(seqno: u8, expected: u8) -> bool {
    seqno == expected || seqno == SEQNO_END
}

/// One Viiiiva config packet.
///
/// Packets are embedded as values in a BLE GATT characteristic. The frame is
/// held verbatim; field accessors read at byte offsets, so the in-memory
/// representation is exactly the wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    frame: [u8; MAX_PACKET_LENGTH],
}

impl Packet {
    /// Create an outgoing packet, populating the direction bytes and CRC.
    ///
    /// `seqno` above [`SEQNO_END`] and payloads longer than
    /// [`MAX_PAYLOAD_LENGTH`] are caller errors.
    pub fn build(seqno: u8, cmd: u16, payload: &[u8]) -> Self {
        debug_assert!(seqno <= SEQNO_END, "sequence number {seqno} out of range");
        debug_assert!(
            payload.len() <= MAX_PAYLOAD_LENGTH,
            "payload of {} bytes does not fit a packet",
            payload.len()
        );

        let mut frame = [0u8; MAX_PACKET_LENGTH];
        frame[OFFSET_PAYLOAD_LENGTH] = payload.len() as u8;
        frame[OFFSET_SENDER] = PEER_HOST;
        frame[OFFSET_RECEIVER] = PEER_DEVICE;
        endian::write_u16(&mut frame, OFFSET_CMD, cmd);
        frame[OFFSET_PAYLOAD..OFFSET_PAYLOAD + payload.len()].copy_from_slice(payload);

        // 3-bit sequence number and 5-bit masked CRC share the first byte.
        let crc = crc8(&frame[OFFSET_PAYLOAD_LENGTH..OFFSET_PAYLOAD + payload.len()]);
        frame[0] = (seqno << 5) | (crc & 0x1f);
        Self { frame }
    }

    /// Create an outgoing packet acknowledging `cmd`.
    pub fn build_ack(cmd: u16) -> Self {
        Self::build(SEQNO_END, acknowledgement(cmd), &[])
    }

    /// Parse a characteristic value into a packet.
    pub fn parse(value: &[u8]) -> Result<Self, ProtocolError> {
        if value.len() < MIN_PACKET_LENGTH
            || value.len() > MAX_PACKET_LENGTH
            || value.len() != OFFSET_PAYLOAD + usize::from(value[OFFSET_PAYLOAD_LENGTH])
        {
            return Err(ProtocolError::BadLength(value.len()));
        }

        let mut frame = [0u8; MAX_PACKET_LENGTH];
        frame[..value.len()].copy_from_slice(value);

        let computed = crc8(&value[OFFSET_PAYLOAD_LENGTH..]) & 0x1f;
        let got = frame[0] & 0x1f;
        if computed != got {
            return Err(ProtocolError::BadCrc { computed, got });
        }

        Ok(Self { frame })
    }

    /// Sequence number carried in the first byte.
    pub fn seqno(&self) -> u8 {
        self.frame[0] >> 5
    }

    /// Number of meaningful payload bytes.
    pub fn payload_length(&self) -> usize {
        usize::from(self.frame[OFFSET_PAYLOAD_LENGTH])
    }

    /// Length of the entire frame, header included.
    pub fn frame_length(&self) -> usize {
        OFFSET_PAYLOAD + self.payload_length()
    }

    /// Command id in host byte order.
    pub fn command_id(&self) -> u16 {
        endian::read_u16(&self.frame, OFFSET_CMD)
    }

    /// The meaningful payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.frame[OFFSET_PAYLOAD..self.frame_length()]
    }

    /// Whether the direction bytes mark this packet as device-originated.
    pub fn is_from_device(&self) -> bool {
        self.frame[OFFSET_SENDER] == PEER_DEVICE && self.frame[OFFSET_RECEIVER] == PEER_HOST
    }

    /// The serialized frame, ready for a GATT write.
    pub fn as_bytes(&self) -> &[u8] {
        &self.frame[..self.frame_length()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_known_bytes() {
        let packet = Packet::build(SEQNO_END, 0x0600, &[]);
        assert_eq!(packet.as_bytes(), [0xe3, 0x00, 0x03, 0x01, 0x00, 0x06]);
        assert_eq!(packet.seqno(), 7);
        assert_eq!(packet.frame_length(), 6);
        assert!(!packet.is_from_device());
    }

    #[test]
    fn test_parse_round_trip() {
        let packet = Packet::build(3, 0x010b, &[0xaa, 0xbb, 0xcc]);
        let parsed = Packet::parse(packet.as_bytes()).unwrap();
        assert_eq!(parsed, packet);
        assert_eq!(parsed.seqno(), 3);
        assert_eq!(parsed.command_id(), 0x010b);
        assert_eq!(parsed.payload(), [0xaa, 0xbb, 0xcc]);
    }

    #[test]
    fn test_parse_rejects_bad_lengths() {
        assert!(matches!(
            Packet::parse(&[0xe3, 0x00, 0x03, 0x01, 0x00]),
            Err(ProtocolError::BadLength(5))
        ));
        assert!(matches!(
            Packet::parse(&[0u8; 21]),
            Err(ProtocolError::BadLength(21))
        ));
        // Total length inconsistent with the payload length byte.
        assert!(matches!(
            Packet::parse(&[0xe3, 0x01, 0x03, 0x01, 0x00, 0x06]),
            Err(ProtocolError::BadLength(6))
        ));
    }

    #[test]
    fn test_parse_rejects_bad_crc() {
        let packet = Packet::build(SEQNO_END, 0x0600, &[]);
        let mut bytes = packet.as_bytes().to_vec();
        bytes[0] ^= 0x01;
        assert!(matches!(
            Packet::parse(&bytes),
            Err(ProtocolError::BadCrc { .. })
        ));
    }

    #[test]
    fn test_crc_ignores_seqno_bits() {
        // The CRC covers bytes [1..); flipping sequence bits must not
        // invalidate the packet.
        let packet = Packet::build(2, 0x0600, &[]);
        let mut bytes = packet.as_bytes().to_vec();
        bytes[0] = (bytes[0] & 0x1f) | (5 << 5);
        let parsed = Packet::parse(&bytes).unwrap();
        assert_eq!(parsed.seqno(), 5);
    }

    #[test]
    fn test_build_ack_sets_high_bit() {
        let ack = Packet::build_ack(0x050b);
        assert_eq!(ack.command_id(), 0x850b);
        assert_eq!(ack.seqno(), SEQNO_END);
        assert_eq!(ack.payload_length(), 0);
    }

    #[test]
    fn test_next_seqno_cycle() {
        for s in 1..=5u8 {
            assert_eq!(next_seqno(s), s + 1);
        }
        assert_eq!(next_seqno(6), 1);
    }

    #[test]
    fn test_seqno_matches_terminal_always() {
        for expected in 0..=7u8 {
            assert!(seqno_matches(SEQNO_END, expected));
        }
        assert!(seqno_matches(3, 3));
        assert!(!seqno_matches(3, 4));
    }
}
