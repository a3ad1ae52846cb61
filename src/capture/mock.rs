// Scripted capture backend for tests
// Pushes raw records through the real sink so the session, pump and hub run as
// they do with an OS hook behind them.

use super::{CaptureError, NativeCapture, RawEvent, RawEventSink};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct MockState {
    sink: Option<RawEventSink>,
    installs: usize,
    removals: usize,
    fail_next_start: Option<CaptureError>,
}

/// Backend handed to the session
pub struct MockCapture {
    state: Arc<Mutex<MockState>>,
}

/// Test-side view of the same backend
#[derive(Clone)]
pub struct MockCaptureHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockCapture {
    pub fn new() -> (Self, MockCaptureHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        (
            Self {
                state: state.clone(),
            },
            MockCaptureHandle { state },
        )
    }
}

impl NativeCapture for MockCapture {
    fn start(&mut self, sink: RawEventSink) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if let Some(err) = state.fail_next_start.take() {
            return Err(err);
        }
        state.sink = Some(sink);
        state.installs += 1;
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state.lock();
        if state.sink.take().is_some() {
            state.removals += 1;
        }
    }

    fn is_active(&self) -> bool {
        self.state.lock().sink.is_some()
    }
}

impl MockCaptureHandle {
    /// Feed one record as if the OS callback fired. Returns false when inactive.
    pub fn feed(&self, event: RawEvent) -> bool {
        let sink = self.state.lock().sink.clone();
        match sink {
            Some(sink) => {
                super::deliver(&sink, event);
                true
            }
            None => false,
        }
    }

    /// Drop the hook from the backend side, as when the OS removes it
    pub fn lose_hook(&self) {
        let mut state = self.state.lock();
        if state.sink.take().is_some() {
            state.removals += 1;
        }
    }

    pub fn fail_next_start(&self, err: CaptureError) {
        self.state.lock().fail_next_start = Some(err);
    }

    /// Number of hooks currently installed
    pub fn live_hooks(&self) -> usize {
        let state = self.state.lock();
        state.installs - state.removals
    }

    pub fn installs(&self) -> usize {
        self.state.lock().installs
    }
}
