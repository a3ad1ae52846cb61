// Capture session: the single owner of the native hook
//
// Lifecycle: Idle -> Starting -> Active -> Stopping -> Idle.
// The session owns the backend, the raw queue and the pump thread that
// normalizes raw records and publishes them to the event hub. Only one session
// may exist per process; constructing a second one fails.

use super::{CaptureError, NativeCapture, RawEvent};
use crate::normalize::EventNormalizer;
use crate::transport::hub::EventHub;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;

/// Default bound of the queue between the OS callback and the pump
pub const DEFAULT_RAW_CAPACITY: usize = 1024;

/// Process-wide claim held by the live session
static SESSION_CLAIMED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Active,
    Stopping,
}

/// Successful results of `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// Start while active is a no-op, not an error
    AlreadyActive,
}

/// Results of `stop`, both of which are success
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    AlreadyInactive,
}

pub struct CaptureSession {
    backend: Box<dyn NativeCapture>,
    state: SessionState,
    hub: EventHub,
    normalizer: EventNormalizer,
    raw_capacity: usize,
    pump: Option<JoinHandle<()>>,
}

impl CaptureSession {
    /// Claim the process-wide session.
    ///
    /// Fails with `SessionExists` while another session is alive.
    pub fn new(
        backend: Box<dyn NativeCapture>,
        hub: EventHub,
        raw_capacity: usize,
    ) -> Result<Self, CaptureError> {
        if SESSION_CLAIMED.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::SessionExists);
        }
        Ok(Self {
            backend,
            state: SessionState::Idle,
            hub,
            normalizer: EventNormalizer::new(),
            raw_capacity: raw_capacity.max(1),
            pump: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active && self.backend.is_active()
    }

    /// Install the OS hook and start pumping events.
    ///
    /// On failure the session is back in Idle with nothing installed.
    pub fn start(&mut self) -> Result<StartOutcome, CaptureError> {
        if self.state == SessionState::Active {
            if self.backend.is_active() {
                crate::debug!("Capture already active, start is a no-op");
                return Ok(StartOutcome::AlreadyActive);
            }
            crate::warn!("Capture backend ended on its own, reinstalling");
            self.stop();
        }

        self.state = SessionState::Starting;
        let (sink, receiver) = mpsc::channel(self.raw_capacity);

        if let Err(e) = self.backend.start(sink) {
            crate::warn!("Failed to start capture: {}", e);
            self.backend.stop();
            self.state = SessionState::Idle;
            return Err(e);
        }

        let hub = self.hub.clone();
        let normalizer = self.normalizer;
        let pump = thread::Builder::new()
            .name("input-pump".to_string())
            .spawn(move || pump_main(receiver, normalizer, hub));

        match pump {
            Ok(handle) => {
                self.pump = Some(handle);
                self.state = SessionState::Active;
                crate::info!("Input capture active");
                Ok(StartOutcome::Started)
            }
            Err(e) => {
                self.backend.stop();
                self.state = SessionState::Idle;
                Err(CaptureError::HookInstallFailed(format!(
                    "Failed to spawn event pump: {}",
                    e
                )))
            }
        }
    }

    /// Release the OS hook and drain the pump.
    ///
    /// Returns only after the hook is removed and every queued record has been
    /// published, so a following `start` never races a half-released hook.
    pub fn stop(&mut self) -> StopOutcome {
        if self.state == SessionState::Idle && self.pump.is_none() {
            return StopOutcome::AlreadyInactive;
        }

        self.state = SessionState::Stopping;
        self.backend.stop();

        // The backend dropped its sink, so the pump sees the queue close
        if let Some(pump) = self.pump.take() {
            if pump.join().is_err() {
                crate::error!("Event pump thread panicked");
            }
        }

        self.state = SessionState::Idle;
        crate::info!("Input capture stopped");
        StopOutcome::Stopped
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
        SESSION_CLAIMED.store(false, Ordering::SeqCst);
    }
}

/// Normalize raw records in arrival order and publish them
fn pump_main(mut receiver: mpsc::Receiver<RawEvent>, normalizer: EventNormalizer, hub: EventHub) {
    crate::debug!("Event pump started");
    while let Some(raw) = receiver.blocking_recv() {
        if let Some(event) = normalizer.normalize_or_drop(&raw) {
            crate::trace!("Publishing {:?}", event);
            hub.publish(&event);
        }
    }
    crate::debug!("Event pump stopped");
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
