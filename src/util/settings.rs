//! Settings file.
//!
//! A single JSON document with camelCase keys. Every field is optional; a
//! missing file means defaults.

use crate::exit::detector::{
    ExitSequenceConfig, DEFAULT_CORNER_RADIUS, DEFAULT_KEYBOARD_SEQUENCE,
    DEFAULT_KEYBOARD_TIMEOUT, DEFAULT_MOUSE_TIMEOUT,
};
use crate::capture::session::DEFAULT_RAW_CAPACITY;
use crate::transport::hub::DEFAULT_SUBSCRIBER_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the settings file location
pub const SETTINGS_ENV: &str = "KEYBOARD_PLAYGROUND_SETTINGS";

/// Directory name under the platform config/data directories
pub const APP_DIR_NAME: &str = "keyboard-playground";

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub exit: ExitSettings,
    pub transport: TransportSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExitSettings {
    pub keyboard_sequence: Vec<String>,
    pub keyboard_timeout_ms: u64,
    pub mouse_timeout_ms: u64,
    pub corner_radius_px: f64,
}

impl Default for ExitSettings {
    fn default() -> Self {
        Self {
            keyboard_sequence: DEFAULT_KEYBOARD_SEQUENCE
                .iter()
                .map(|k| k.to_string())
                .collect(),
            keyboard_timeout_ms: DEFAULT_KEYBOARD_TIMEOUT.as_millis() as u64,
            mouse_timeout_ms: DEFAULT_MOUSE_TIMEOUT.as_millis() as u64,
            corner_radius_px: DEFAULT_CORNER_RADIUS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportSettings {
    /// Per-subscriber queue bound
    pub event_buffer_capacity: usize,
    /// Queue bound between the OS callback and the pump
    pub raw_buffer_capacity: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            event_buffer_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            raw_buffer_capacity: DEFAULT_RAW_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// "error", "warn", "info", "debug", "trace" or "off"
    pub level: Option<String>,
}

/// Settings file location: the override variable, else the platform config dir
pub fn settings_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(SETTINGS_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(SETTINGS_FILE))
}

impl Settings {
    /// Load from the default location
    pub fn load() -> Result<Self, SettingsError> {
        match settings_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load and validate one file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let settings: Settings =
            serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let invalid = |key, reason: &str| {
            Err(SettingsError::Invalid {
                key,
                reason: reason.to_string(),
            })
        };

        if self.exit.keyboard_sequence.is_empty() {
            return invalid("exit.keyboardSequence", "must contain at least one key");
        }
        if self.exit.keyboard_timeout_ms == 0 {
            return invalid("exit.keyboardTimeoutMs", "must be positive");
        }
        if self.exit.mouse_timeout_ms == 0 {
            return invalid("exit.mouseTimeoutMs", "must be positive");
        }
        if !(self.exit.corner_radius_px.is_finite() && self.exit.corner_radius_px > 0.0) {
            return invalid("exit.cornerRadiusPx", "must be a positive number");
        }
        if self.transport.event_buffer_capacity == 0 {
            return invalid("transport.eventBufferCapacity", "must be positive");
        }
        if self.transport.raw_buffer_capacity == 0 {
            return invalid("transport.rawBufferCapacity", "must be positive");
        }
        if let Some(level) = &self.logging.level {
            if level.parse::<log::LevelFilter>().is_err() {
                return invalid("logging.level", "unknown log level");
            }
        }
        Ok(())
    }

    pub fn exit_config(&self) -> ExitSequenceConfig {
        ExitSequenceConfig {
            keyboard_sequence: self.exit.keyboard_sequence.clone(),
            keyboard_timeout: Duration::from_millis(self.exit.keyboard_timeout_ms),
            mouse_timeout: Duration::from_millis(self.exit.mouse_timeout_ms),
            corner_radius: self.exit.corner_radius_px,
        }
    }

    /// Configured log level, if any
    pub fn log_level(&self) -> Option<log::LevelFilter> {
        self.logging.level.as_deref().and_then(|l| l.parse().ok())
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
