//! Core types used throughout Vivalink.

use std::fmt;

use serde::{Deserialize, Serialize};

/// ANT-FS file type of a directory entry, assembled from the raw record as
/// `(subtype << 8) | file_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    /// Observed on a real device, semantics unknown.
    Unknown0001,
    /// Device information file.
    FitDevice,
    /// .FIT activity log.
    FitActivity,
    /// Any combination this crate does not know about.
    Other(u16),
}

impl FileType {
    /// Build a file type from the combined 16-bit raw value.
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0x0001 => Self::Unknown0001,
            0x0180 => Self::FitDevice,
            0x0480 => Self::FitActivity,
            other => Self::Other(other),
        }
    }

    /// The combined 16-bit raw value.
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Unknown0001 => 0x0001,
            Self::FitDevice => 0x0180,
            Self::FitActivity => 0x0480,
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown0001 => write!(f, "unknown"),
            Self::FitDevice => write!(f, "device"),
            Self::FitActivity => write!(f, "activity"),
            Self::Other(raw) => write!(f, "{raw:#06x}"),
        }
    }
}

/// A parsed directory entry, as delivered to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Creation time of the file, in seconds since the POSIX epoch.
    pub posix_time: i64,
    /// Length of the file in bytes.
    pub length: u32,
    /// Identifier of the file for download and erase commands.
    pub index: u16,
    /// Type of the file.
    pub file_type: FileType,
}

impl DirectoryEntry {
    /// Synthetic file name exposed for this entry: four lowercase hex digits
    /// of the index followed by `.fit`.
    pub fn file_name(&self) -> String {
        file_name(self.index)
    }
}

/// Synthetic file name for a file index.
pub fn file_name(index: u16) -> String {
    format!("{index:04x}.fit")
}

/// Parse a synthetic `xxxx.fit` file name back to its index.
///
/// Returns `None` for anything that is not exactly four hex digits followed
/// by `.fit`.
pub fn parse_file_name(name: &str) -> Option<u16> {
    let stem = name.strip_suffix(".fit")?;
    if stem.len() != 4 {
        return None;
    }
    u16::from_str_radix(stem, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_raw_round_trip() {
        for raw in [0x0001u16, 0x0180, 0x0480, 0xbeef] {
            assert_eq!(FileType::from_raw(raw).as_u16(), raw);
        }
        assert_eq!(FileType::from_raw(0x0480), FileType::FitActivity);
    }

    #[test]
    fn test_file_name_round_trip() {
        assert_eq!(file_name(0x1234), "1234.fit");
        assert_eq!(file_name(2), "0002.fit");
        assert_eq!(parse_file_name("1234.fit"), Some(0x1234));
        assert_eq!(parse_file_name("0002.fit"), Some(2));
    }

    #[test]
    fn test_parse_file_name_rejects_garbage() {
        assert_eq!(parse_file_name("123.fit"), None);
        assert_eq!(parse_file_name("12345.fit"), None);
        assert_eq!(parse_file_name("wxyz.fit"), None);
        assert_eq!(parse_file_name("1234.bin"), None);
        assert_eq!(parse_file_name("1234"), None);
    }
}
