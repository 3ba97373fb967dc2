//! Download of a file, or of the directory itself.

use tracing::debug;

use crate::manager::{ErrorCode, ManagerDelegate};
use crate::protocol::{
    endian, Burst, Directory, Packet, CMD_DOWNLOAD, CMD_DOWNLOAD_REPLY, DIRECTORY_INDEX,
    DIRECTORY_RECORD_LENGTH, SEQNO_END,
};

use super::CommandError;

/// Request payload: index (2) + offset (4) + length limit (4).
const REQUEST_PAYLOAD_LENGTH: usize = 10;

/// Ceiling on the capacity reserved up front from the device-announced
/// length. The accumulator still grows past this if the device actually
/// sends more; announced lengths are not to be trusted with allocations.
const MAX_PRERESERVE: u32 = 1 << 20;

/// State machine for one download exchange.
///
/// The device acknowledges the request, echoing the index and offset and
/// announcing the transfer length, then streams the content as a burst of
/// reply packets. The accumulated bytes are handed to the delegate when the
/// burst ends: parsed directory events for index 0, the raw blob otherwise.
#[derive(Debug)]
pub struct Download {
    index: u16,
    offset: u32,
    length_limit: u32,
    buf: Vec<u8>,
    burst: Burst,
    has_ack: bool,
}

impl Download {
    /// Download a whole file from offset 0.
    pub fn new(index: u16) -> Self {
        Self::with_range(index, 0, u32::MAX)
    }

    /// Download `length_limit` bytes of a file starting at `offset`.
    pub fn with_range(index: u16, offset: u32, length_limit: u32) -> Self {
        Self {
            index,
            offset,
            length_limit,
            buf: Vec::new(),
            burst: Burst::new(),
            has_ack: false,
        }
    }

    pub(crate) fn command_packet(&self) -> Packet {
        let mut payload = [0u8; REQUEST_PAYLOAD_LENGTH];
        endian::write_u16(&mut payload, 0, self.index);
        endian::write_u32(&mut payload, 2, self.offset);
        endian::write_u32(&mut payload, 6, self.length_limit);
        Packet::build(SEQNO_END, CMD_DOWNLOAD, &payload)
    }

    pub(crate) fn read_packet(&mut self, packet: &Packet) -> Result<usize, CommandError> {
        if self.has_ack {
            self.read_reply(packet)
        } else {
            self.read_ack(packet)
        }
    }

    /// Validate the acknowledgement: it must echo the request parameters.
    ///
    /// The announced value at payload `[6..10)` is a byte count, except for
    /// directory downloads where it is a record count. It is used to size the
    /// accumulator and rejected when above `length_limit`, but replies are
    /// not checked against it; the delegate receives whatever the device
    /// actually sent.
    fn read_ack(&mut self, packet: &Packet) -> Result<usize, CommandError> {
        super::read_ack(packet, CMD_DOWNLOAD)?;
        let payload = packet.payload();
        if payload.len() != REQUEST_PAYLOAD_LENGTH {
            return Err(CommandError::AckMismatch);
        }

        let announced = endian::read_u32(payload, 6);
        if endian::read_u16(payload, 0) != self.index
            || endian::read_u32(payload, 2) != self.offset
        {
            return Err(CommandError::AckMismatch);
        }
        if announced > self.length_limit {
            return Err(CommandError::AnnouncedTooLong {
                announced,
                limit: self.length_limit,
            });
        }

        let expected_bytes = if self.index == DIRECTORY_INDEX {
            announced.saturating_mul(DIRECTORY_RECORD_LENGTH as u32)
        } else {
            announced
        };
        self.buf.reserve(expected_bytes.min(MAX_PRERESERVE) as usize);
        debug!(index = self.index, announced, "download acknowledged");

        self.has_ack = true;
        Ok(0)
    }

    /// Append the content carried by a reply packet to the accumulator.
    fn read_reply(&mut self, packet: &Packet) -> Result<usize, CommandError> {
        if !packet.is_from_device() {
            return Err(CommandError::NotFromDevice);
        }
        let got = packet.command_id();
        if got != CMD_DOWNLOAD_REPLY {
            return Err(CommandError::UnexpectedCommandId {
                expected: CMD_DOWNLOAD_REPLY,
                got,
            });
        }
        if packet.payload_length() == 0 {
            return Err(CommandError::BadReply);
        }

        let burst = self.burst.read_packet(packet);
        if !burst.is_valid() {
            return Err(CommandError::OutOfSequence);
        }
        self.burst = burst;

        self.buf.extend_from_slice(packet.payload());
        Ok(packet.payload_length())
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.has_ack && self.burst.has_ended()
    }

    pub(crate) fn finish(&mut self, delegate: &mut dyn ManagerDelegate) {
        let data = std::mem::take(&mut self.buf);
        if self.index != DIRECTORY_INDEX {
            delegate.on_download_file(self.index, data);
            return;
        }

        match Directory::parse(&data) {
            Ok(directory) => {
                delegate.on_parse_clock(directory.clock());
                for entry in directory.entries().values() {
                    delegate.on_parse_directory_entry(*entry);
                }
                delegate.on_finish_parsing_directory();
            }
            Err(err) => {
                delegate.on_error(ErrorCode::BadHeader, &format!("error parsing directory: {err}"));
            }
        }
    }
}
