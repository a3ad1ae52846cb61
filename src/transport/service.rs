// Dedicated capture thread
//
// The capture session lives on one thread that processes commands strictly in
// order. Installing and removing OS hooks can block briefly, so callers await a
// oneshot response instead of touching the session directly.

use crate::capture::{
    CaptureError, CaptureSession, NativeCapture, StartOutcome, StopOutcome,
};
use crate::transport::hub::EventHub;
use crate::transport::TransportError;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;

/// Commands sent to the capture thread
pub enum CaptureCommand {
    Start(oneshot::Sender<Result<StartOutcome, CaptureError>>),
    Stop(oneshot::Sender<StopOutcome>),
    IsCapturing(oneshot::Sender<bool>),
    /// Stop capture and end the thread
    Shutdown,
}

/// Handle to the capture thread
///
/// Send + Sync; share it behind an Arc. Dropping the handle stops capture and
/// joins the thread, so the hook is released before the drop returns.
pub struct CaptureServiceHandle {
    sender: Sender<CaptureCommand>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureServiceHandle {
    /// Claim the process-wide session and spawn its thread
    pub fn spawn(
        backend: Box<dyn NativeCapture>,
        hub: EventHub,
        raw_capacity: usize,
    ) -> Result<Self, CaptureError> {
        let session = CaptureSession::new(backend, hub, raw_capacity)?;
        let (sender, receiver) = mpsc::channel();

        let thread = thread::Builder::new()
            .name("capture-service".to_string())
            .spawn(move || capture_thread_main(session, receiver))
            .map_err(|e| {
                CaptureError::HookInstallFailed(format!("Failed to spawn capture thread: {}", e))
            })?;

        Ok(Self {
            sender,
            thread: Some(thread),
        })
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> CaptureCommand,
    ) -> Result<T, TransportError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.sender
            .send(make(response_tx))
            .map_err(|_| TransportError::ServiceDisconnected)?;
        response_rx
            .await
            .map_err(|_| TransportError::ServiceDisconnected)
    }

    pub async fn start(&self) -> Result<StartOutcome, TransportError> {
        Ok(self.request(CaptureCommand::Start).await??)
    }

    pub async fn stop(&self) -> Result<StopOutcome, TransportError> {
        self.request(CaptureCommand::Stop).await
    }

    pub async fn is_capturing(&self) -> Result<bool, TransportError> {
        self.request(CaptureCommand::IsCapturing).await
    }
}

impl Drop for CaptureServiceHandle {
    fn drop(&mut self) {
        // Ignore errors if the thread already exited
        let _ = self.sender.send(CaptureCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Main loop for the capture thread
#[cfg_attr(coverage_nightly, coverage(off))]
fn capture_thread_main(mut session: CaptureSession, receiver: Receiver<CaptureCommand>) {
    crate::debug!("Capture service thread started");

    while let Ok(command) = receiver.recv() {
        match command {
            CaptureCommand::Start(response) => {
                let _ = response.send(session.start());
            }
            CaptureCommand::Stop(response) => {
                let _ = response.send(session.stop());
            }
            CaptureCommand::IsCapturing(response) => {
                let _ = response.send(session.is_active());
            }
            CaptureCommand::Shutdown => break,
        }
    }

    session.stop();
    crate::debug!("Capture service thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::mock::MockCapture;
    use crate::capture::raw::{LinuxRawEvent, RawEvent};
    use serial_test::serial;

    #[tokio::test]
    #[serial]
    async fn test_commands_round_trip() {
        let (backend, handle) = MockCapture::new();
        let service = CaptureServiceHandle::spawn(Box::new(backend), EventHub::default(), 16).unwrap();

        assert!(!service.is_capturing().await.unwrap());
        assert_eq!(service.start().await.unwrap(), StartOutcome::Started);
        assert_eq!(service.start().await.unwrap(), StartOutcome::AlreadyActive);
        assert!(service.is_capturing().await.unwrap());
        assert_eq!(handle.live_hooks(), 1);

        assert_eq!(service.stop().await.unwrap(), StopOutcome::Stopped);
        assert_eq!(service.stop().await.unwrap(), StopOutcome::AlreadyInactive);
        assert_eq!(handle.live_hooks(), 0);
    }

    #[tokio::test]
    #[serial]
    async fn test_start_failure_is_typed() {
        let (backend, handle) = MockCapture::new();
        handle.fail_next_start(CaptureError::HookInstallFailed("busy".to_string()));
        let service = CaptureServiceHandle::spawn(Box::new(backend), EventHub::default(), 16).unwrap();

        match service.start().await {
            Err(TransportError::Capture(e)) => assert!(e.is_retryable()),
            other => panic!("expected capture error, got {:?}", other),
        }
        assert!(!service.is_capturing().await.unwrap());
    }

    #[tokio::test]
    #[serial]
    async fn test_drop_releases_hook() {
        let (backend, handle) = MockCapture::new();
        let hub = EventHub::default();
        let mut events = hub.subscribe();
        let service = CaptureServiceHandle::spawn(Box::new(backend), hub.clone(), 16).unwrap();
        service.start().await.unwrap();
        handle.feed(RawEvent::Linux(LinuxRawEvent {
            timestamp: 3,
            ev_type: 2,
            code: 0,
            value: 1,
            ..Default::default()
        }));

        drop(service);
        assert_eq!(handle.live_hooks(), 0);
        assert_eq!(events.try_recv().map(|e| e.timestamp), Some(3));
    }

    #[tokio::test]
    #[serial]
    async fn test_second_service_is_rejected() {
        let (backend, _) = MockCapture::new();
        let _first = CaptureServiceHandle::spawn(Box::new(backend), EventHub::default(), 16).unwrap();
        let (backend, _) = MockCapture::new();
        let second = CaptureServiceHandle::spawn(Box::new(backend), EventHub::default(), 16);
        assert!(matches!(second, Err(CaptureError::SessionExists)));
    }
}
