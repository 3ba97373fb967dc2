//! Configuration and preference management.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Persisted preferences.
///
/// Currently only the identifier of the last device a session connected to,
/// so subsequent invocations can skip straight to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
    /// Identifier of the last-connected peripheral.
    #[serde(default)]
    pub last_device: Option<String>,
}

impl Preferences {
    /// Load preferences from file. A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read preferences: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse preferences: {e}")))
    }

    /// Save preferences to file, creating parent directories as needed.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config dir: {e}")))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize preferences: {e}")))?;
        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write preferences: {e}")))?;
        Ok(())
    }

    /// Default preferences path under the platform config directory.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("org", "vivalink", "vivalink").map_or_else(
            || PathBuf::from("vivalink.toml"),
            |dirs| dirs.config_dir().join("preferences.toml"),
        )
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error).
    pub level: String,
    /// Enable ANSI colors.
    pub color: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            color: true,
        }
    }
}

/// Initialize the global tracing subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(config.color).with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferences_round_trip() {
        let dir = std::env::temp_dir().join(format!("vivalink-test-{}", std::process::id()));
        let path = dir.join("preferences.toml");

        let prefs = Preferences {
            last_device: Some("hci0/dev_C0_FF_EE_00_11_22".into()),
        };
        prefs.save(&path).unwrap();
        let loaded = Preferences::load(&path).unwrap();
        assert_eq!(loaded.last_device, prefs.last_device);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let loaded = Preferences::load("/nonexistent/vivalink/preferences.toml").unwrap();
        assert!(loaded.last_device.is_none());
    }
}
