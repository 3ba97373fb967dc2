//! # Vivalink
//!
//! Host-side engine and CLI for the Viiiiva heart rate monitor's proprietary
//! file protocol, carried over a single BLE GATT characteristic.
//!
//! The protocol engine ([`Manager`]) is synchronous and transport-agnostic:
//! it encodes commands into framed packets, decodes value notifications,
//! sequences multi-packet burst transfers, and drives a per-command state
//! machine through acknowledgement-and-reply exchanges. The client supplies a
//! [`ManagerDelegate`] for outbound writes and structured result events.
//!
//! ## Architecture
//!
//! ┌─────────────────────────────────────────────────────────┐
//! │                  CLI (list / copy / erase / clock)      │
//! ├─────────────────────────────────────────────────────────┤
//! │           BLE Transport (btleplug GATT session)         │
//! ├─────────────────────────────────────────────────────────┤
//! │        Protocol Manager (command slot, event fan-out)   │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐               │
//! │  │ Download │  │  Erase   │  │ Set time │               │
//! │  └──────────┘  └──────────┘  └──────────┘               │
//! ├─────────────────────────────────────────────────────────┤
//! │     Wire Protocol (packets, CRC-8, bursts, directory)   │
//! └─────────────────────────────────────────────────────────┘

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)] // Intentional wire-width narrowing

pub mod command;
pub mod config;
pub mod error;
pub mod manager;
pub mod protocol;
pub mod transport;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{Error, Result};
pub use manager::{ErrorCode, Manager, ManagerDelegate};
pub use types::{DirectoryEntry, FileType};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
