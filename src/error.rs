//! Error types for Vivalink.

use std::io;

use thiserror::Error;

/// Result type alias for Vivalink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Vivalink.
#[derive(Error, Debug)]
pub enum Error {
    // Protocol errors
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    // Transport errors
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("device reported failure: {0}")]
    DeviceFailure(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    // CLI surface errors
    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // General errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Wire-level protocol errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("packet length {0} is not a valid frame length")]
    BadLength(usize),

    #[error("CRC mismatch: computed {computed:#04x}, got {got:#04x}")]
    BadCrc { computed: u8, got: u8 },

    #[error("unsupported directory version {0}")]
    BadDirectoryVersion(u8),

    #[error("unsupported directory record length {0}")]
    BadRecordLength(u8),

    #[error("unsupported directory time format {0}")]
    BadTimeFormat(u8),

    #[error("directory shorter than its header")]
    TruncatedDirectory,
}

/// Transport layer errors.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("no Bluetooth adapter found")]
    NoAdapter,

    #[error("no device found advertising the Viiiiva service")]
    DeviceNotFound,

    #[error("device has no protocol characteristic")]
    CharacteristicNotFound,

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("session closed")]
    SessionClosed,

    #[error("timed out waiting for the device")]
    Timeout,

    #[error("bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),
}
