//! Sequence tracking for multi-packet reply bursts.
//!
//! Reply payloads span several packets cycling through sequence numbers
//! 1..6, with the terminal packet carrying [`SEQNO_END`]. A [`Burst`] tracks
//! the next expected number; reading a packet yields a new value rather than
//! mutating the old one, so callers only commit to a transition once it
//! validates.

use super::packet::{next_seqno, seqno_matches, Packet, SEQNO_END};

/// Next-expected value before any packet has been read.
const SEQNO_UNINITIALIZED: u8 = 0;

/// In-memory sentinel for a burst that went out of sequence. Never appears
/// on the wire.
const SEQNO_INVALID: u8 = 8;

/// Sequence state of one reply burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Burst {
    next_expected: u8,
}

impl Burst {
    /// A burst with no packets read.
    pub fn new() -> Self {
        Self {
            next_expected: SEQNO_UNINITIALIZED,
        }
    }

    /// True if no packets have been read.
    pub fn is_empty(self) -> bool {
        self.next_expected == SEQNO_UNINITIALIZED
    }

    /// True once the terminal packet has been read.
    pub fn has_ended(self) -> bool {
        self.next_expected == SEQNO_END
    }

    /// False once an out-of-sequence packet has been read.
    pub fn is_valid(self) -> bool {
        self.next_expected != SEQNO_INVALID
    }

    /// The state after reading `packet`.
    ///
    /// An empty burst accepts whatever number the device opens with; after
    /// that, each packet must carry the expected number or the terminal
    /// marker. Reading anything past the terminal packet, or a packet whose
    /// sequence number does not continue this burst, yields the invalid
    /// state.
    #[must_use]
    pub fn read_packet(self, packet: &Packet) -> Self {
        let seqno = packet.seqno();
        if self.next_expected == SEQNO_END
            || (!self.is_empty() && !seqno_matches(seqno, self.next_expected))
        {
            Self {
                next_expected: SEQNO_INVALID,
            }
        } else if seqno == SEQNO_END {
            Self {
                next_expected: seqno,
            }
        } else {
            Self {
                next_expected: next_seqno(seqno),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(seqno: u8) -> Packet {
        Packet::build(seqno, 0x030b, &[0x00])
    }

    #[test]
    fn test_new_burst_is_empty() {
        let burst = Burst::new();
        assert!(burst.is_empty());
        assert!(burst.is_valid());
        assert!(!burst.has_ended());
    }

    #[test]
    fn test_in_order_burst_ends() {
        let mut burst = Burst::new();
        for seqno in [1, 2, 3, 4, 5, 6, 1, 2] {
            burst = burst.read_packet(&reply(seqno));
            assert!(burst.is_valid());
            assert!(!burst.has_ended());
        }
        burst = burst.read_packet(&reply(SEQNO_END));
        assert!(burst.is_valid());
        assert!(burst.has_ended());
    }

    #[test]
    fn test_single_terminal_packet() {
        let burst = Burst::new().read_packet(&reply(SEQNO_END));
        assert!(burst.has_ended());
    }

    #[test]
    fn test_first_packet_sets_expectation() {
        // The opening number is taken as-is; only continuation is checked.
        let burst = Burst::new().read_packet(&reply(3));
        assert!(burst.is_valid());
        assert!(!burst.read_packet(&reply(3)).is_valid());
        assert!(burst.read_packet(&reply(4)).is_valid());
    }

    #[test]
    fn test_out_of_order_is_invalid() {
        let burst = Burst::new().read_packet(&reply(1)).read_packet(&reply(3));
        assert!(!burst.is_valid());
        assert!(!burst.has_ended());
    }

    #[test]
    fn test_read_past_end_is_invalid() {
        let ended = Burst::new().read_packet(&reply(SEQNO_END));
        for seqno in 0..=7u8 {
            assert!(!ended.read_packet(&reply(seqno)).is_valid());
        }
    }

    #[test]
    fn test_read_packet_does_not_mutate() {
        let burst = Burst::new().read_packet(&reply(1));
        let _ = burst.read_packet(&reply(2));
        assert_eq!(burst, Burst::new().read_packet(&reply(1)));
    }
}
