// Event normalizer: platform-shaped raw records to CanonicalEvent
// Stateless apart from the fixed decode tables in the per-platform modules.
// Runs on the pump thread, never on the OS callback thread.

pub mod keys;
pub mod linux;
pub mod macos;
pub mod windows;

pub use keys::canonicalize;

use crate::capture::raw::RawEvent;
use crate::events::CanonicalEvent;

/// Errors produced while decoding a raw record
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    /// The capture layer produced a record none of the decode tables cover
    #[error("Unrecognized {platform} event shape: {detail}")]
    UnrecognizedEventShape {
        platform: &'static str,
        detail: String,
    },
}

/// Converts provisional records into canonical events.
///
/// Every record maps to exactly one event or to an error; nothing is
/// reinterpreted or reordered.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventNormalizer;

impl EventNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, raw: &RawEvent) -> Result<CanonicalEvent, NormalizeError> {
        match raw {
            RawEvent::Mac(e) => macos::normalize(e),
            RawEvent::Windows(e) => windows::normalize(e),
            RawEvent::Linux(e) => linux::normalize(e),
        }
    }

    /// Normalize for the live stream.
    ///
    /// An undecodable record is a capture-layer bug: it aborts debug builds and
    /// is logged and dropped in release builds. Errors never reach the stream.
    pub fn normalize_or_drop(&self, raw: &RawEvent) -> Option<CanonicalEvent> {
        match self.normalize(raw) {
            Ok(event) => Some(event),
            Err(e) => {
                crate::error!("Dropping raw event: {}", e);
                debug_assert!(false, "capture layer produced an undecodable record: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
