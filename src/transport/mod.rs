//! BLE GATT transport for the protocol engine.
//!
//! Discovers a peripheral advertising the Viiiiva config service, subscribes
//! to value notifications, and bridges them to the synchronous [`Manager`].
//! The bridge keeps all engine entry points on one task: the manager's
//! delegate pushes outbound writes and result events onto channels, and the
//! session loop drains them between notifications.

use std::pin::Pin;
use std::time::Duration;

use btleplug::api::{
    Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Peripheral};
use futures::stream::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Error, Result, TransportError};
use crate::manager::{ErrorCode, Manager, ManagerDelegate};
use crate::protocol::{time, CHARACTERISTIC_UUID, SERVICE_UUID};
use crate::types::DirectoryEntry;

/// Transport tuning knobs.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// How long to scan before giving up on discovery.
    pub scan_timeout: Duration,
    /// Inactivity window while waiting for device traffic.
    pub inactivity_timeout: Duration,
    /// Identifier of a specific peripheral to connect to.
    pub device: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            scan_timeout: Duration::from_secs(15),
            inactivity_timeout: Duration::from_secs(16),
            device: None,
        }
    }
}

/// Everything the engine reports during one command.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StartWaiting,
    FinishWaiting,
    Error(ErrorCode, String),
    Clock(i64),
    DirectoryEntry(DirectoryEntry),
    DirectoryDone,
    FileDownloaded(u16, Vec<u8>),
    FileErased(u16, bool),
    TimeSet(bool),
}

/// Delegate that forwards engine callbacks onto the session's channels.
struct BridgeDelegate {
    writes: mpsc::UnboundedSender<Vec<u8>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl BridgeDelegate {
    fn emit(&self, event: SessionEvent) {
        // The session outlives the manager during a command; a closed
        // channel only happens on teardown, where events are moot.
        let _ = self.events.send(event);
    }
}

impl ManagerDelegate for BridgeDelegate {
    fn write_value(&mut self, value: &[u8]) -> std::result::Result<(), TransportError> {
        self.writes
            .send(value.to_vec())
            .map_err(|_| TransportError::SessionClosed)
    }

    fn start_waiting(&mut self) {
        self.emit(SessionEvent::StartWaiting);
    }

    fn finish_waiting(&mut self) {
        self.emit(SessionEvent::FinishWaiting);
    }

    fn on_error(&mut self, code: ErrorCode, message: &str) {
        self.emit(SessionEvent::Error(code, message.to_string()));
    }

    fn on_parse_clock(&mut self, posix_time: i64) {
        self.emit(SessionEvent::Clock(posix_time));
    }

    fn on_parse_directory_entry(&mut self, entry: DirectoryEntry) {
        self.emit(SessionEvent::DirectoryEntry(entry));
    }

    fn on_finish_parsing_directory(&mut self) {
        self.emit(SessionEvent::DirectoryDone);
    }

    fn on_download_file(&mut self, index: u16, data: Vec<u8>) {
        self.emit(SessionEvent::FileDownloaded(index, data));
    }

    fn on_erase_file(&mut self, index: u16, ok: bool) {
        self.emit(SessionEvent::FileErased(index, ok));
    }

    fn on_set_time(&mut self, ok: bool) {
        self.emit(SessionEvent::TimeSet(ok));
    }
}

/// A connected, subscribed GATT session speaking the config protocol.
pub struct Session {
    peripheral: Peripheral,
    characteristic: Characteristic,
    notifications: Pin<Box<dyn Stream<Item = btleplug::api::ValueNotification> + Send>>,
    manager: Manager,
    writes: mpsc::UnboundedReceiver<Vec<u8>>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    inactivity_timeout: Duration,
}

impl Session {
    /// Discover, connect, and subscribe.
    pub async fn connect(config: &TransportConfig) -> Result<Self> {
        let adapter = default_adapter().await?;
        let peripheral = discover(&adapter, config).await?;

        peripheral.connect().await.map_err(TransportError::from)?;
        peripheral
            .discover_services()
            .await
            .map_err(TransportError::from)?;

        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == CHARACTERISTIC_UUID)
            .ok_or(TransportError::CharacteristicNotFound)?;
        if !characteristic.properties.contains(CharPropFlags::NOTIFY) {
            warn!("protocol characteristic does not advertise notify support");
        }

        peripheral
            .subscribe(&characteristic)
            .await
            .map_err(TransportError::from)?;
        let notifications = peripheral
            .notifications()
            .await
            .map_err(TransportError::from)?;

        info!(device = %peripheral.id(), "connected");

        let (writes_tx, writes_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let manager = Manager::new(Box::new(BridgeDelegate {
            writes: writes_tx,
            events: events_tx,
        }));

        Ok(Self {
            peripheral,
            characteristic,
            notifications,
            manager,
            writes: writes_rx,
            events: events_rx,
            inactivity_timeout: config.inactivity_timeout,
        })
    }

    /// Identifier of the connected peripheral, for preference storage.
    pub fn device_id(&self) -> String {
        self.peripheral.id().to_string()
    }

    /// Download the directory: device clock plus all entries.
    pub async fn list_directory(&mut self) -> Result<(i64, Vec<DirectoryEntry>)> {
        self.manager.download_directory();
        let events = self.run_until_finished().await?;

        let mut clock = None;
        let mut entries = Vec::new();
        for event in check_events(events)? {
            match event {
                SessionEvent::Clock(posix_time) => clock = Some(posix_time),
                SessionEvent::DirectoryEntry(entry) => entries.push(entry),
                _ => {}
            }
        }
        let clock = clock
            .ok_or_else(|| Error::DeviceFailure("directory download ended without a clock".into()))?;
        Ok((clock, entries))
    }

    /// Download the file at `index` as an opaque blob.
    pub async fn download_file(&mut self, index: u16) -> Result<Vec<u8>> {
        self.manager.download_file(index);
        let events = self.run_until_finished().await?;

        for event in check_events(events)? {
            if let SessionEvent::FileDownloaded(got, data) = event {
                if got == index {
                    return Ok(data);
                }
            }
        }
        Err(Error::DeviceFailure("download produced no file".into()))
    }

    /// Erase the file at `index`. `Ok(false)` means the device refused.
    pub async fn erase_file(&mut self, index: u16) -> Result<bool> {
        self.manager.erase_file(index);
        let events = self.run_until_finished().await?;

        for event in check_events(events)? {
            if let SessionEvent::FileErased(_, ok) = event {
                return Ok(ok);
            }
        }
        Err(Error::DeviceFailure("erase produced no result".into()))
    }

    /// Set the device clock to `posix_time`.
    pub async fn set_time(&mut self, posix_time: i64) -> Result<bool> {
        self.manager.set_time(posix_time);
        self.finish_set_time().await
    }

    /// Set the device clock from the host clock, rounding fractional seconds
    /// up to the next whole second.
    pub async fn set_time_now(&mut self) -> Result<bool> {
        self.set_time(time::posix_round_up(std::time::SystemTime::now()))
            .await
    }

    /// Disconnect from the peripheral.
    pub async fn disconnect(mut self) -> Result<()> {
        let _ = self.peripheral.unsubscribe(&self.characteristic).await;
        self.peripheral
            .disconnect()
            .await
            .map_err(TransportError::from)?;
        Ok(())
    }

    async fn finish_set_time(&mut self) -> Result<bool> {
        let events = self.run_until_finished().await?;
        for event in check_events(events)? {
            if let SessionEvent::TimeSet(ok) = event {
                return Ok(ok);
            }
        }
        Err(Error::DeviceFailure("set-time produced no result".into()))
    }

    /// Drive the engine until it leaves the waiting state, returning every
    /// event it emitted along the way.
    ///
    /// The inactivity window restarts on `start_waiting` and on every
    /// outbound write while waiting; a lapse delivers `notify_timeout` to
    /// the engine.
    async fn run_until_finished(&mut self) -> Result<Vec<SessionEvent>> {
        let mut collected = Vec::new();
        let mut waiting = false;
        let mut deadline = Instant::now() + self.inactivity_timeout;

        loop {
            while let Ok(event) = self.events.try_recv() {
                match event {
                    SessionEvent::StartWaiting => {
                        waiting = true;
                        deadline = Instant::now() + self.inactivity_timeout;
                    }
                    SessionEvent::FinishWaiting => {
                        self.flush_writes(&mut waiting, &mut deadline).await?;
                        return Ok(collected);
                    }
                    event => collected.push(event),
                }
            }

            self.flush_writes(&mut waiting, &mut deadline).await?;

            tokio::select! {
                notification = self.notifications.next() => match notification {
                    Some(n) if n.uuid == CHARACTERISTIC_UUID => {
                        debug!(len = n.value.len(), "value notification");
                        self.manager.notify_value(&n.value);
                    }
                    Some(_) => {}
                    None => return Err(TransportError::SessionClosed.into()),
                },
                () = tokio::time::sleep_until(deadline), if waiting => {
                    // Fatal to the in-flight command; the engine clears its
                    // slot and leaves the waiting state.
                    self.manager.notify_timeout();
                    return Err(TransportError::Timeout.into());
                }
            }
        }
    }

    /// Perform all pending GATT writes, restarting the inactivity window for
    /// each one while waiting.
    async fn flush_writes(&mut self, waiting: &mut bool, deadline: &mut Instant) -> Result<()> {
        while let Ok(value) = self.writes.try_recv() {
            self.peripheral
                .write(&self.characteristic, &value, WriteType::WithResponse)
                .await
                .map_err(|e| TransportError::WriteFailed(e.to_string()))?;
            if *waiting {
                *deadline = Instant::now() + self.inactivity_timeout;
            }
        }
        Ok(())
    }
}

/// Fail on the first error event; a one-shot client treats any protocol
/// error during a command as fatal.
fn check_events(events: Vec<SessionEvent>) -> Result<Vec<SessionEvent>> {
    for event in &events {
        if let SessionEvent::Error(code, message) = event {
            return Err(Error::DeviceFailure(format!("{code}: {message}")));
        }
    }
    Ok(events)
}

async fn default_adapter() -> Result<Adapter> {
    let manager = btleplug::platform::Manager::new()
        .await
        .map_err(TransportError::from)?;
    let adapters = manager.adapters().await.map_err(TransportError::from)?;
    adapters.into_iter().next().ok_or_else(|| TransportError::NoAdapter.into())
}

/// Scan until a matching peripheral appears or the scan window lapses.
async fn discover(adapter: &Adapter, config: &TransportConfig) -> Result<Peripheral> {
    adapter
        .start_scan(ScanFilter {
            services: vec![SERVICE_UUID],
        })
        .await
        .map_err(TransportError::from)?;

    let scan_deadline = Instant::now() + config.scan_timeout;
    let found = loop {
        if Instant::now() >= scan_deadline {
            break None;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;

        let peripherals = adapter.peripherals().await.map_err(TransportError::from)?;
        let mut candidate = None;
        for peripheral in peripherals {
            if let Some(wanted) = &config.device {
                if &peripheral.id().to_string() == wanted {
                    candidate = Some(peripheral);
                    break;
                }
                continue;
            }
            if let Ok(Some(props)) = peripheral.properties().await {
                if props.services.contains(&SERVICE_UUID)
                    || props
                        .local_name
                        .as_deref()
                        .is_some_and(|name| name.starts_with("Viiiiva"))
                {
                    candidate = Some(peripheral);
                    break;
                }
            }
        }
        if candidate.is_some() {
            break candidate;
        }
    };

    let _ = adapter.stop_scan().await;
    found.ok_or_else(|| TransportError::DeviceNotFound.into())
}
