// Native input capture
// Each platform installs one system-wide interception point that swallows every
// keyboard and mouse event while active and forwards a provisional raw record per
// OS notification. All FFI stays inside the platform modules; the rest of the crate
// only sees the NativeCapture trait and the raw record stream.

pub mod raw;
pub mod session;

#[cfg(target_os = "macos")]
pub mod cgeventtap;
#[cfg(target_os = "linux")]
pub mod evdev_grab;
#[cfg(target_os = "windows")]
pub mod windows_hook;

#[cfg(test)]
pub mod mock;

pub use raw::RawEvent;
pub use session::{CaptureSession, SessionState, StartOutcome, StopOutcome};

use crate::exit::geometry::ScreenGeometryProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Producer side of the raw record queue handed to a backend on start
pub type RawEventSink = mpsc::Sender<RawEvent>;

/// Callbacks slower than this are reported, since they stall input system-wide
pub const SLOW_CALLBACK_THRESHOLD: Duration = Duration::from_millis(10);

/// Errors from native capture operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaptureError {
    /// The OS refused the hook because the user has not granted access
    #[error("{permission} permission not granted. {hint}")]
    PermissionDenied { permission: String, hint: String },
    /// Transient OS failure while installing the hook
    #[error("Failed to install input hook: {0}")]
    HookInstallFailed(String),
    /// A second session was constructed in the same process
    #[error("A capture session already exists in this process")]
    SessionExists,
}

impl CaptureError {
    /// Stable identifier used on the wire
    pub fn code(&self) -> &'static str {
        match self {
            CaptureError::PermissionDenied { .. } => "permissionDenied",
            CaptureError::HookInstallFailed(_) => "hookInstallFailed",
            CaptureError::SessionExists => "sessionExists",
        }
    }

    /// Whether retrying `start` without user action can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, CaptureError::HookInstallFailed(_))
    }

    /// How to grant the missing permission, when there is one
    pub fn hint(&self) -> Option<&str> {
        match self {
            CaptureError::PermissionDenied { hint, .. } => Some(hint),
            _ => None,
        }
    }
}

/// Platform interception point.
///
/// Implementations must:
/// - swallow every delivered event while active,
/// - do nothing in the OS callback beyond copying fields and `try_send`,
/// - release the OS hook and drop every clone of the sink before `stop` returns.
pub trait NativeCapture: Send {
    /// Install the hook. Raw records are sent to `sink` until `stop`.
    fn start(&mut self, sink: RawEventSink) -> Result<(), CaptureError>;

    /// Remove the hook. Never fails and is a no-op when not started.
    fn stop(&mut self);

    fn is_active(&self) -> bool;
}

/// Enqueue from an OS callback. Never blocks; a full queue drops the record.
pub(crate) fn deliver(sink: &RawEventSink, event: RawEvent) {
    match sink.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            crate::warn!("Raw event queue full, dropping input record");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            crate::trace!("Raw event queue closed, dropping input record");
        }
    }
}

/// Create the capture backend for the current platform.
///
/// The geometry provider is used by backends that have to track the pointer
/// themselves (Linux reads relative motion from evdev).
pub fn create_native_capture(
    geometry: Arc<dyn ScreenGeometryProvider>,
) -> Box<dyn NativeCapture> {
    #[cfg(target_os = "macos")]
    {
        let _ = geometry;
        Box::new(cgeventtap::CGEventTapCapture::new())
    }

    #[cfg(target_os = "windows")]
    {
        let _ = geometry;
        Box::new(windows_hook::WindowsHookCapture::new())
    }

    #[cfg(target_os = "linux")]
    {
        Box::new(evdev_grab::EvdevGrabCapture::new(geometry))
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        let _ = geometry;
        Box::new(UnsupportedCapture)
    }
}

/// Backend for platforms without an interception API
#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
struct UnsupportedCapture;

#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
impl NativeCapture for UnsupportedCapture {
    fn start(&mut self, _sink: RawEventSink) -> Result<(), CaptureError> {
        Err(CaptureError::HookInstallFailed(
            "Input capture is not supported on this platform".to_string(),
        ))
    }

    fn stop(&mut self) {}

    fn is_active(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_and_retryability() {
        let denied = CaptureError::PermissionDenied {
            permission: "accessibility".to_string(),
            hint: "Open System Settings".to_string(),
        };
        assert_eq!(denied.code(), "permissionDenied");
        assert!(!denied.is_retryable());
        assert_eq!(denied.hint(), Some("Open System Settings"));
        assert!(denied.to_string().contains("accessibility"));

        let failed = CaptureError::HookInstallFailed("no tap".to_string());
        assert_eq!(failed.code(), "hookInstallFailed");
        assert!(failed.is_retryable());
        assert_eq!(failed.hint(), None);

        assert_eq!(CaptureError::SessionExists.code(), "sessionExists");
        assert!(!CaptureError::SessionExists.is_retryable());
    }

    #[test]
    fn test_deliver_drops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let record = RawEvent::Linux(raw::LinuxRawEvent::default());
        deliver(&tx, record.clone());
        deliver(&tx, record.clone());

        assert_eq!(rx.try_recv().ok(), Some(record));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_deliver_after_close_is_silent() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        deliver(&tx, RawEvent::Linux(raw::LinuxRawEvent::default()));
    }
}
