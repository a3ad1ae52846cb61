// Async driver for the exit detector
// Waits on whichever comes first: the next canonical event or the earliest
// live sequence deadline. Exactly one timer exists per sequence because the
// deadline is recomputed from the detector on every iteration.

use super::detector::ExitSequenceDetector;
use crate::transport::hub::EventSubscription;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Run the detector until the event stream ends
pub async fn run_exit_detector(
    mut detector: ExitSequenceDetector,
    mut events: EventSubscription,
) {
    crate::debug!("Exit detector running");
    loop {
        let deadline = detector.next_deadline();
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => detector.handle_event(&event, Instant::now()),
                None => break,
            },
            _ = sleep_until(deadline) => detector.handle_timeouts(Instant::now()),
        }
    }
    crate::debug!("Exit detector stopped, event stream closed");
}

/// Spawn the detector on the current runtime
pub fn spawn_exit_detector(
    detector: ExitSequenceDetector,
    events: EventSubscription,
) -> JoinHandle<()> {
    tokio::spawn(run_exit_detector(detector, events))
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
