//! Erase of a single file.

use crate::manager::ManagerDelegate;
use crate::protocol::{endian, Packet, CMD_ERASE, CMD_ERASE_REPLY, SEQNO_END};

use super::CommandError;

/// State machine for one erase exchange.
///
/// The device acknowledges the command, then reports the outcome in a
/// one-byte reply: zero for success, anything else for failure. The reply
/// itself must be acknowledged by the host to close the exchange.
#[derive(Debug)]
pub struct Erase {
    index: u16,
    has_ack: bool,
    finished: bool,
    ok: bool,
}

impl Erase {
    pub fn new(index: u16) -> Self {
        Self {
            index,
            has_ack: false,
            finished: false,
            ok: false,
        }
    }

    pub(crate) fn command_packet(&self) -> Packet {
        let mut payload = [0u8; 2];
        endian::write_u16(&mut payload, 0, self.index);
        Packet::build(SEQNO_END, CMD_ERASE, &payload)
    }

    /// The outbound acknowledgement for the device's reply.
    pub(crate) fn reply_ack_packet(&self) -> Packet {
        Packet::build_ack(CMD_ERASE_REPLY)
    }

    pub(crate) fn read_packet(&mut self, packet: &Packet) -> Result<usize, CommandError> {
        if self.has_ack {
            self.read_reply(packet)
        } else {
            super::read_ack(packet, CMD_ERASE).map(|()| {
                self.has_ack = true;
                0
            })
        }
    }

    fn read_reply(&mut self, packet: &Packet) -> Result<usize, CommandError> {
        if self.finished {
            return Err(CommandError::AlreadyFinished);
        }
        if !packet.is_from_device() {
            return Err(CommandError::NotFromDevice);
        }
        let got = packet.command_id();
        if got != CMD_ERASE_REPLY {
            return Err(CommandError::UnexpectedCommandId {
                expected: CMD_ERASE_REPLY,
                got,
            });
        }
        if packet.payload_length() != 1 {
            return Err(CommandError::BadReply);
        }

        self.ok = packet.payload()[0] == 0;
        self.finished = true;
        Ok(0)
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.has_ack && self.finished
    }

    pub(crate) fn finish(&mut self, delegate: &mut dyn ManagerDelegate) {
        delegate.on_erase_file(self.index, self.ok);
    }
}

#[cfg(test)]
mod tests {
    use crate::command::testing::{device_packet, Callback, RecordingDelegate};
    use crate::protocol::acknowledgement;

    use super::*;

    fn ack() -> Packet {
        device_packet(SEQNO_END, acknowledgement(CMD_ERASE), &[])
    }

    fn reply(status: u8) -> Packet {
        device_packet(SEQNO_END, CMD_ERASE_REPLY, &[status])
    }

    #[test]
    fn test_command_packet_layout() {
        let packet = Erase::new(0x1234).command_packet();
        assert_eq!(packet.command_id(), CMD_ERASE);
        assert_eq!(packet.payload(), [0x34, 0x12]);
    }

    #[test]
    fn test_successful_exchange() {
        let mut command = Erase::new(0x1234);
        assert!(command.read_packet(&ack()).is_ok());
        assert!(!command.is_terminal());
        assert!(command.read_packet(&reply(0)).is_ok());
        assert!(command.is_terminal());

        let mut delegate = RecordingDelegate::default();
        command.finish(&mut delegate);
        assert_eq!(delegate.calls(), vec![Callback::EraseFile(0x1234, true)]);
    }

    #[test]
    fn test_failure_status_is_terminal_but_not_ok() {
        let mut command = Erase::new(0x1234);
        command.read_packet(&ack()).unwrap();
        assert!(command.read_packet(&reply(1)).is_ok());
        assert!(command.is_terminal());

        let mut delegate = RecordingDelegate::default();
        command.finish(&mut delegate);
        assert_eq!(delegate.calls(), vec![Callback::EraseFile(0x1234, false)]);
    }

    #[test]
    fn test_reply_before_ack_rejected() {
        let mut command = Erase::new(0x1234);
        // Routed to the ack path, where the command id does not match.
        assert!(command.read_packet(&reply(0)).is_err());
        assert!(!command.is_terminal());
    }

    #[test]
    fn test_second_reply_rejected() {
        let mut command = Erase::new(0x1234);
        command.read_packet(&ack()).unwrap();
        command.read_packet(&reply(0)).unwrap();
        assert_eq!(
            command.read_packet(&reply(0)),
            Err(CommandError::AlreadyFinished)
        );
    }

    #[test]
    fn test_reply_with_long_payload_rejected() {
        let mut command = Erase::new(0x1234);
        command.read_packet(&ack()).unwrap();
        assert_eq!(
            command.read_packet(&device_packet(SEQNO_END, CMD_ERASE_REPLY, &[0, 0])),
            Err(CommandError::BadReply)
        );
    }

    #[test]
    fn test_reply_ack_packet() {
        let ack = Erase::new(1).reply_ack_packet();
        assert_eq!(ack.command_id(), acknowledgement(CMD_ERASE_REPLY));
        assert_eq!(ack.payload_length(), 0);
    }
}
