//! Top-level protocol orchestration.
//!
//! The [`Manager`] owns the in-flight command, routes inbound value
//! notifications to it, and fans results out to the client through a
//! [`ManagerDelegate`]. It is synchronous and transport-agnostic: the client
//! delivers raw notification values and timeout signals, and receives
//! serialized packets to write.
//!
//! All entry points must be called from one serial execution context, and
//! delegate implementations must not call back into the manager; both are
//! asserted in debug builds.

use std::cell::Cell;
use std::fmt;

use tracing::{debug, warn};

use crate::command::{Command, Download, Erase, SetTime};
use crate::error::TransportError;
use crate::protocol::{self, Packet, DIRECTORY_INDEX};
use crate::types::DirectoryEntry;

/// Error kind surfaced through [`ManagerDelegate::on_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// No error.
    None,
    /// The header part of a packet (length, CRC) was invalid.
    BadHeader,
    /// The payload part of a packet failed command-level validation.
    BadPayload,
    /// A notification or timeout arrived when none was expected, or the
    /// transport write failed.
    Unexpected,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::BadHeader => write!(f, "bad header"),
            Self::BadPayload => write!(f, "bad payload"),
            Self::Unexpected => write!(f, "unexpected"),
        }
    }
}

/// Callback surface owned by the manager.
///
/// `write_value`, `start_waiting` and `finish_waiting` drive the transport;
/// the `on_*` events deliver results and default to no-ops.
pub trait ManagerDelegate {
    /// Deliver a serialized packet to the GATT characteristic.
    ///
    /// An error return is treated as a fatal transport failure.
    fn write_value(&mut self, value: &[u8]) -> Result<(), TransportError>;

    /// The manager is now waiting for device traffic.
    ///
    /// No further operations may be issued until `finish_waiting`.
    fn start_waiting(&mut self);

    /// The manager is no longer waiting for device traffic.
    fn finish_waiting(&mut self);

    /// An error occurred. Transient packet errors do not abort the in-flight
    /// command; the device may resend.
    fn on_error(&mut self, code: ErrorCode, message: &str) {
        let _ = (code, message);
    }

    /// The device clock was read from a downloaded directory header.
    fn on_parse_clock(&mut self, posix_time: i64) {
        let _ = posix_time;
    }

    /// One entry of a downloaded directory.
    fn on_parse_directory_entry(&mut self, entry: DirectoryEntry) {
        let _ = entry;
    }

    /// All entries of the downloaded directory have been delivered.
    fn on_finish_parsing_directory(&mut self) {}

    /// A file download completed.
    fn on_download_file(&mut self, index: u16, data: Vec<u8>) {
        let _ = (index, data);
    }

    /// An erase completed; `ok` reflects the device's status byte.
    fn on_erase_file(&mut self, index: u16, ok: bool) {
        let _ = (index, ok);
    }

    /// A set-clock completed.
    fn on_set_time(&mut self, ok: bool) {
        let _ = ok;
    }
}

/// Protocol manager: holds the current command and drives it to completion.
pub struct Manager {
    delegate: Box<dyn ManagerDelegate>,
    /// The in-flight command. `None` when idle.
    slot: Option<Command>,
    /// Detects delegate implementations that recurse back into the manager.
    /// Debug builds only.
    busy: Cell<bool>,
}

impl Manager {
    /// Create a manager that calls `delegate`, assuming ownership.
    pub fn new(delegate: Box<dyn ManagerDelegate>) -> Self {
        Self {
            delegate,
            slot: None,
            busy: Cell::new(false),
        }
    }

    /// Process one GATT value notification.
    pub fn notify_value(&mut self, value: &[u8]) {
        let _busy = Self::enter(&self.busy);

        let packet = match Packet::parse(value) {
            Ok(packet) => packet,
            Err(err) => {
                self.delegate.on_error(
                    ErrorCode::BadHeader,
                    &format!("invalid value notification: {err}"),
                );
                return;
            }
        };

        let Some(mut command) = self.slot.take() else {
            self.delegate
                .on_error(ErrorCode::Unexpected, "unexpected value notification");
            return;
        };

        if let Err(err) = command.read_packet(&packet) {
            debug!(command = command.name(), %err, "rejected value notification");
            self.delegate.on_error(
                ErrorCode::BadPayload,
                &format!("{}: invalid value notification: {err}", command.name()),
            );
            // The device may still resend; keep the command in flight.
            self.slot = Some(command);
            return;
        }

        // The reply-ack goes out before the completion callbacks, and
        // without re-entering the waiting state.
        if command.is_terminal() {
            if let Some(ack) = command.reply_ack_packet() {
                self.write_packet(&ack, false);
            }
        }

        if command.maybe_finish(self.delegate.as_mut()) {
            self.delegate.finish_waiting();
        } else {
            self.slot = Some(command);
        }
    }

    /// Process an inactivity timeout raised by the client's timer.
    ///
    /// A timeout is fatal to the in-flight command.
    pub fn notify_timeout(&mut self) {
        let _busy = Self::enter(&self.busy);

        if let Some(command) = self.slot.take() {
            warn!(command = command.name(), "timeout waiting for the device");
            self.delegate.on_error(
                ErrorCode::Unexpected,
                &format!("{}: timeout waiting for command", command.name()),
            );
            self.delegate.finish_waiting();
        }
    }

    /// Download and parse the directory, reporting entries and the device
    /// clock through the delegate.
    pub fn download_directory(&mut self) {
        let _busy = Self::enter(&self.busy);
        self.dispatch(Command::Download(Download::new(DIRECTORY_INDEX)));
    }

    /// Download the file at `index`, reported via `on_download_file`.
    pub fn download_file(&mut self, index: u16) {
        let _busy = Self::enter(&self.busy);
        self.dispatch(Command::Download(Download::new(index)));
    }

    /// Erase the file at `index`, reported via `on_erase_file`.
    pub fn erase_file(&mut self, index: u16) {
        let _busy = Self::enter(&self.busy);
        self.dispatch(Command::Erase(Erase::new(index)));
    }

    /// Set the device clock to `posix_time`, reported via `on_set_time`.
    pub fn set_time(&mut self, posix_time: i64) {
        let _busy = Self::enter(&self.busy);
        let device_time = protocol::time::to_device(posix_time);
        self.dispatch(Command::SetTime(SetTime::new(device_time)));
    }

    /// Send `command`'s write packet and make it the in-flight command.
    ///
    /// Any previous command is dropped; clients are expected to wait for
    /// `finish_waiting` between operations.
    fn dispatch(&mut self, command: Command) {
        debug!(command = command.name(), "dispatching");
        let packet = command.command_packet();
        self.slot = Some(command);
        self.write_packet(&packet, true);
    }

    /// Serialize `packet` and hand it to the delegate, entering the waiting
    /// state afterwards if `wait` is set.
    fn write_packet(&mut self, packet: &Packet, wait: bool) {
        if let Err(err) = self.delegate.write_value(packet.as_bytes()) {
            self.delegate
                .on_error(ErrorCode::Unexpected, &format!("write_value: {err}"));
            return;
        }
        if wait {
            self.delegate.start_waiting();
        }
    }

    fn enter(busy: &Cell<bool>) -> BusyGuard {
        debug_assert!(
            !busy.get(),
            "manager operation invoked re-entrantly from a delegate callback"
        );
        busy.set(true);
        BusyGuard(busy as *const Cell<bool>)
    }
}

struct BusyGuard(*const Cell<bool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        // SAFETY: the pointer is derived from `&self.busy` in `Manager::enter`
        // and the guard's lifetime never outlives the call that created it,
        // so the `Manager` is still alive here.
        unsafe { (*self.0).set(false) };
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::command::testing::{device_packet, Callback, RecordingDelegate};
    use crate::protocol::{acknowledgement, CMD_SET_TIME, SEQNO_END};

    use super::*;

    /// A manager plus a handle on its delegate's callback log.
    fn manager_with_log() -> (Manager, Rc<RefCell<Vec<Callback>>>) {
        let delegate = RecordingDelegate::default();
        let log = delegate.log();
        (Manager::new(Box::new(delegate)), log)
    }

    #[test]
    fn test_unexpected_notification_without_command() {
        let (mut manager, log) = manager_with_log();
        let ack = device_packet(SEQNO_END, acknowledgement(CMD_SET_TIME), &[]);
        manager.notify_value(ack.as_bytes());
        assert_eq!(
            *log.borrow(),
            vec![Callback::Error(
                ErrorCode::Unexpected,
                "unexpected value notification".into()
            )]
        );
    }

    #[test]
    fn test_parse_error_keeps_command_in_flight() {
        let (mut manager, log) = manager_with_log();
        manager.set_time(crate::protocol::time::DEVICE_EPOCH);
        manager.notify_value(&[0x00, 0x01, 0x02]);

        // A valid ack afterwards still completes the command.
        let ack = device_packet(SEQNO_END, acknowledgement(CMD_SET_TIME), &[]);
        manager.notify_value(ack.as_bytes());

        let recorded = log.borrow();
        assert!(matches!(recorded[2], Callback::Error(ErrorCode::BadHeader, _)));
        assert_eq!(recorded[3], Callback::SetTime(true));
        assert_eq!(recorded[4], Callback::FinishWaiting);
    }

    #[test]
    fn test_write_failure_surfaces_unexpected() {
        let mut delegate = RecordingDelegate::default();
        delegate.fail_writes = true;
        let log = delegate.log();
        let mut manager = Manager::new(Box::new(delegate));

        manager.set_time(crate::protocol::time::DEVICE_EPOCH);
        let recorded = log.borrow();
        // The write is recorded, then the failure; waiting never starts.
        assert!(matches!(recorded[0], Callback::WriteValue(_)));
        assert!(matches!(recorded[1], Callback::Error(ErrorCode::Unexpected, _)));
        assert_eq!(recorded.len(), 2);
    }

    #[test]
    fn test_timeout_without_command_is_silent() {
        let (mut manager, log) = manager_with_log();
        manager.notify_timeout();
        assert!(log.borrow().is_empty());
    }
}
