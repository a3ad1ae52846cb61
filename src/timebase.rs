//! Monotonic capture clock.
//!
//! Event timestamps are milliseconds since an epoch fixed the first time the
//! clock is read (process start in practice). `Instant` is used rather than
//! wall-clock time so clock adjustments never skew timeout logic.

use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Pin the epoch. Called once at startup so the first captured event does not
/// define time zero.
pub fn init() {
    let _ = EPOCH.get_or_init(Instant::now);
}

/// Milliseconds elapsed since the process epoch.
pub fn now_ms() -> u64 {
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_millis() as u64
}
