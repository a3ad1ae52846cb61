//! Shared utilities.
//!
//! - `settings`: settings file loading and validation

pub mod settings;

pub use settings::{Settings, SettingsError};
