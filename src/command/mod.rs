//! Per-command protocol state machines.
//!
//! Every operation the manager can issue is one variant of [`Command`]:
//! download (file or directory), erase, or set-time. Download and erase
//! share the ack-then-reply skeleton: the device first acknowledges the
//! command packet, then sends a reply carrying the result. Set-time is
//! acknowledgement-only.

mod download;
mod erase;
mod set_time;

pub use download::Download;
pub use erase::Erase;
pub use set_time::SetTime;

use thiserror::Error;

use crate::manager::ManagerDelegate;
use crate::protocol::{acknowledgement, Packet};

/// Reasons a command rejects a value notification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("packet is not from the device")]
    NotFromDevice,

    #[error("unexpected command id {got:#06x}, expected {expected:#06x}")]
    UnexpectedCommandId { expected: u16, got: u16 },

    #[error("acknowledgement does not match the request")]
    AckMismatch,

    #[error("announced length {announced} exceeds the requested limit {limit}")]
    AnnouncedTooLong { announced: u32, limit: u32 },

    #[error("malformed reply payload")]
    BadReply,

    #[error("packet out of burst sequence")]
    OutOfSequence,

    #[error("command already finished")]
    AlreadyFinished,
}

/// The in-flight command held by the manager's slot.
#[derive(Debug)]
pub enum Command {
    Download(Download),
    Erase(Erase),
    SetTime(SetTime),
}

impl Command {
    /// Name for error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Download(_) => "download command",
            Self::Erase(_) => "erase command",
            Self::SetTime(_) => "set time command",
        }
    }

    /// The write packet that initiates this command.
    pub fn command_packet(&self) -> Packet {
        match self {
            Self::Download(cmd) => cmd.command_packet(),
            Self::Erase(cmd) => cmd.command_packet(),
            Self::SetTime(cmd) => cmd.command_packet(),
        }
    }

    /// Feed one parsed value notification to the command.
    ///
    /// Returns the number of content bytes consumed.
    pub fn read_packet(&mut self, packet: &Packet) -> Result<usize, CommandError> {
        match self {
            Self::Download(cmd) => cmd.read_packet(packet),
            Self::Erase(cmd) => cmd.read_packet(packet),
            Self::SetTime(cmd) => cmd.read_packet(packet),
        }
    }

    /// Whether the command has observed everything it was waiting for.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Download(cmd) => cmd.is_terminal(),
            Self::Erase(cmd) => cmd.is_terminal(),
            Self::SetTime(cmd) => cmd.is_terminal(),
        }
    }

    /// The outbound acknowledgement the device expects after its reply, for
    /// variants that require one.
    pub fn reply_ack_packet(&self) -> Option<Packet> {
        match self {
            Self::Erase(cmd) => Some(cmd.reply_ack_packet()),
            Self::Download(_) | Self::SetTime(_) => None,
        }
    }

    /// Fire the completion callbacks if the command is terminal.
    ///
    /// Returns whether it was; a terminal command must be dropped afterwards.
    pub fn maybe_finish(&mut self, delegate: &mut dyn ManagerDelegate) -> bool {
        if !self.is_terminal() {
            return false;
        }
        match self {
            Self::Download(cmd) => cmd.finish(delegate),
            Self::Erase(cmd) => cmd.finish(delegate),
            Self::SetTime(cmd) => cmd.finish(delegate),
        }
        true
    }
}

/// Validate an acknowledgement notification for `cmd`: it must come from the
/// device and carry the acknowledgement command id.
///
/// This is separate from the GATT write response; the device sends it as an
/// additional value notification afterwards.
fn read_ack(packet: &Packet, cmd: u16) -> Result<(), CommandError> {
    if !packet.is_from_device() {
        return Err(CommandError::NotFromDevice);
    }
    let expected = acknowledgement(cmd);
    let got = packet.command_id();
    if got != expected {
        return Err(CommandError::UnexpectedCommandId { expected, got });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::manager::{ErrorCode, ManagerDelegate};
    use crate::protocol::{crc8, Packet};
    use crate::types::DirectoryEntry;

    /// Build a device-originated packet, as [`Packet::build`] does for
    /// host-originated ones.
    pub fn device_packet(seqno: u8, cmd: u16, payload: &[u8]) -> Packet {
        let mut frame = vec![0u8; 6 + payload.len()];
        frame[1] = payload.len() as u8;
        frame[2] = 1;
        frame[3] = 3;
        frame[4..6].copy_from_slice(&cmd.to_le_bytes());
        frame[6..].copy_from_slice(payload);
        frame[0] = (seqno << 5) | (crc8(&frame[1..]) & 0x1f);
        Packet::parse(&frame).unwrap()
    }

    /// Everything a delegate can observe, in order.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Callback {
        WriteValue(Vec<u8>),
        StartWaiting,
        FinishWaiting,
        Error(ErrorCode, String),
        ParseClock(i64),
        ParseDirectoryEntry(DirectoryEntry),
        FinishParsingDirectory,
        DownloadFile(u16, Vec<u8>),
        EraseFile(u16, bool),
        SetTime(bool),
    }

    /// Delegate that records every callback into a shared log.
    #[derive(Debug, Default)]
    pub struct RecordingDelegate {
        calls: Rc<RefCell<Vec<Callback>>>,
        pub fail_writes: bool,
    }

    impl RecordingDelegate {
        /// A handle on the log that stays readable after the delegate has
        /// been moved into a manager.
        pub fn log(&self) -> Rc<RefCell<Vec<Callback>>> {
            Rc::clone(&self.calls)
        }

        /// The callbacks recorded so far.
        pub fn calls(&self) -> Vec<Callback> {
            self.calls.borrow().clone()
        }

        fn record(&self, callback: Callback) {
            self.calls.borrow_mut().push(callback);
        }
    }

    impl ManagerDelegate for RecordingDelegate {
        fn write_value(&mut self, value: &[u8]) -> Result<(), crate::error::TransportError> {
            self.record(Callback::WriteValue(value.to_vec()));
            if self.fail_writes {
                Err(crate::error::TransportError::WriteFailed("test".into()))
            } else {
                Ok(())
            }
        }

        fn start_waiting(&mut self) {
            self.record(Callback::StartWaiting);
        }

        fn finish_waiting(&mut self) {
            self.record(Callback::FinishWaiting);
        }

        fn on_error(&mut self, code: ErrorCode, message: &str) {
            self.record(Callback::Error(code, message.to_string()));
        }

        fn on_parse_clock(&mut self, posix_time: i64) {
            self.record(Callback::ParseClock(posix_time));
        }

        fn on_parse_directory_entry(&mut self, entry: DirectoryEntry) {
            self.record(Callback::ParseDirectoryEntry(entry));
        }

        fn on_finish_parsing_directory(&mut self) {
            self.record(Callback::FinishParsingDirectory);
        }

        fn on_download_file(&mut self, index: u16, data: Vec<u8>) {
            self.record(Callback::DownloadFile(index, data));
        }

        fn on_erase_file(&mut self, index: u16, ok: bool) {
            self.record(Callback::EraseFile(index, ok));
        }

        fn on_set_time(&mut self, ok: bool) {
            self.record(Callback::SetTime(ok));
        }
    }
}
