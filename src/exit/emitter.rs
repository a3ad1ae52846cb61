//! Channel-backed exit event emitter.
//!
//! Progress snapshots go out on a broadcast channel (UI read model, any number
//! of listeners). The exit request is a watch value so late listeners still
//! see that exit was requested.

use crate::events::{ExitEventEmitter, ExitProgress, ExitRequest};
use tokio::sync::{broadcast, watch};

const PROGRESS_CAPACITY: usize = 64;

pub struct ChannelExitEmitter {
    progress: broadcast::Sender<ExitProgress>,
    exit: watch::Sender<Option<ExitRequest>>,
}

/// Fire-once exit notification consumed by shutdown logic
#[derive(Clone)]
pub struct ExitSignal {
    receiver: watch::Receiver<Option<ExitRequest>>,
}

impl ChannelExitEmitter {
    pub fn new() -> (Self, ExitSignal) {
        let (progress, _) = broadcast::channel(PROGRESS_CAPACITY);
        let (exit, receiver) = watch::channel(None);
        (Self { progress, exit }, ExitSignal { receiver })
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<ExitProgress> {
        self.progress.subscribe()
    }
}

impl ExitEventEmitter for ChannelExitEmitter {
    fn emit_exit_progress(&self, progress: ExitProgress) {
        // No listeners is fine: the UI may not be attached
        let _ = self.progress.send(progress);
    }

    fn emit_exit_requested(&self, request: ExitRequest) {
        self.exit.send_replace(Some(request));
    }
}

impl ExitSignal {
    /// Exit request, if one has been made
    pub fn requested(&self) -> Option<ExitRequest> {
        *self.receiver.borrow()
    }

    /// Wait until exit is requested. None if the emitter is gone first.
    pub async fn wait(&mut self) -> Option<ExitRequest> {
        match self.receiver.wait_for(|r| r.is_some()).await {
            Ok(request) => *request,
            Err(_) => None,
        }
    }
}
