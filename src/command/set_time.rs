//! Setting the device clock.

use tracing::warn;

use crate::manager::ManagerDelegate;
use crate::protocol::{endian, Packet, CMD_SET_TIME, SEQNO_END};

use super::CommandError;

/// State machine for one set-clock exchange.
///
/// The device sends no reply for this command, only the acknowledgement.
#[derive(Debug)]
pub struct SetTime {
    /// Device-epoch time to send.
    device_time: u32,
    has_ack: bool,
}

impl SetTime {
    pub fn new(device_time: u32) -> Self {
        Self {
            device_time,
            has_ack: false,
        }
    }

    pub(crate) fn command_packet(&self) -> Packet {
        let mut payload = [0u8; 4];
        endian::write_u32(&mut payload, 0, self.device_time);
        Packet::build(SEQNO_END, CMD_SET_TIME, &payload)
    }

    pub(crate) fn read_packet(&mut self, packet: &Packet) -> Result<usize, CommandError> {
        if self.has_ack {
            return Err(CommandError::AlreadyFinished);
        }
        super::read_ack(packet, CMD_SET_TIME).map(|()| {
            self.has_ack = true;
            0
        })
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.has_ack
    }

    pub(crate) fn finish(&mut self, delegate: &mut dyn ManagerDelegate) {
        if !self.has_ack {
            warn!("set-time completion reached without an acknowledgement");
        }
        delegate.on_set_time(self.has_ack);
    }
}
