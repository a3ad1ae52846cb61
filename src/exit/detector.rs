// Exit sequence detector
// Two independent ordered sequences over the same event stream: a keyboard path
// matched on key-down names and a mouse path matched on left clicks in screen
// corners. Completing either emits one exit request. Anomalies only ever reset.

use super::geometry::{Corner, ScreenGeometryProvider};
use super::sequence::{OrderedSequence, StepOutcome};
use crate::events::{
    CanonicalEvent, EventData, ExitEventEmitter, ExitProgress, ExitRequest, MouseButton,
    ProgressState, SequenceKind,
};
use crate::normalize::canonicalize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_KEYBOARD_SEQUENCE: [&str; 5] = ["Alt", "Control", "ArrowRight", "Escape", "Q"];
pub const DEFAULT_KEYBOARD_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MOUSE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CORNER_RADIUS: f64 = 50.0;

/// Parameters of both exit paths
#[derive(Debug, Clone, PartialEq)]
pub struct ExitSequenceConfig {
    /// Key names, canonicalized on construction
    pub keyboard_sequence: Vec<String>,
    pub keyboard_timeout: Duration,
    pub mouse_timeout: Duration,
    pub corner_radius: f64,
}

impl Default for ExitSequenceConfig {
    fn default() -> Self {
        Self {
            keyboard_sequence: DEFAULT_KEYBOARD_SEQUENCE
                .iter()
                .map(|k| k.to_string())
                .collect(),
            keyboard_timeout: DEFAULT_KEYBOARD_TIMEOUT,
            mouse_timeout: DEFAULT_MOUSE_TIMEOUT,
            corner_radius: DEFAULT_CORNER_RADIUS,
        }
    }
}

pub struct ExitSequenceDetector {
    keyboard: OrderedSequence<String>,
    mouse: OrderedSequence<Corner>,
    /// Last key pressed with no key-up since; a repeated down is auto-repeat
    held_key: Option<String>,
    corner_radius: f64,
    geometry: Arc<dyn ScreenGeometryProvider>,
    emitter: Arc<dyn ExitEventEmitter>,
}

impl ExitSequenceDetector {
    pub fn new(
        config: ExitSequenceConfig,
        geometry: Arc<dyn ScreenGeometryProvider>,
        emitter: Arc<dyn ExitEventEmitter>,
    ) -> Self {
        let keys = config
            .keyboard_sequence
            .iter()
            .map(|k| canonicalize(k))
            .collect();
        Self {
            keyboard: OrderedSequence::new(keys, config.keyboard_timeout),
            mouse: OrderedSequence::new(Corner::CLOCKWISE.to_vec(), config.mouse_timeout),
            held_key: None,
            corner_radius: config.corner_radius,
            geometry,
            emitter,
        }
    }

    pub fn keyboard_step(&self) -> usize {
        self.keyboard.current_step()
    }

    pub fn mouse_step(&self) -> usize {
        self.mouse.current_step()
    }

    /// Earliest live deadline across both paths
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.keyboard.deadline(), self.mouse.deadline()) {
            (Some(k), Some(m)) => Some(k.min(m)),
            (k, m) => k.or(m),
        }
    }

    /// Reset every path whose deadline has passed
    pub fn handle_timeouts(&mut self, now: Instant) {
        if self.keyboard.expire(now) {
            crate::debug!("Keyboard exit sequence timed out");
            self.emit_idle(SequenceKind::Keyboard);
        }
        if self.mouse.expire(now) {
            crate::debug!("Mouse exit sequence timed out");
            self.emit_idle(SequenceKind::Mouse);
        }
    }

    /// Feed one canonical event to both paths
    pub fn handle_event(&mut self, event: &CanonicalEvent, now: Instant) {
        // Timers are authoritative even if the runner has not woken up yet
        self.handle_timeouts(now);

        match &event.data {
            EventData::KeyDown(key) => {
                if self.held_key.as_deref() == Some(key.key.as_str()) {
                    return;
                }
                self.held_key = Some(key.key.clone());
                let outcome = self.keyboard.observe(now, |step| *step == key.key);
                self.apply(SequenceKind::Keyboard, outcome, event.timestamp, now);
            }
            EventData::KeyUp(key) => {
                if self.held_key.as_deref() == Some(key.key.as_str()) {
                    self.held_key = None;
                }
            }
            EventData::MouseDown(click) => {
                let size = self.geometry.screen_size();
                if size.is_none() {
                    crate::debug!("Screen geometry unavailable, corner click cannot match");
                }
                let radius = self.corner_radius;
                let outcome = self.mouse.observe(now, |corner| {
                    click.button == MouseButton::Left
                        && size.is_some_and(|s| corner.contains(s, click.x, click.y, radius))
                });
                self.apply(SequenceKind::Mouse, outcome, event.timestamp, now);
            }
            // Motion, release and scroll never affect either path
            _ => {}
        }
    }

    /// (current step, total steps) of one path
    fn counts(&self, kind: SequenceKind) -> (usize, usize) {
        match kind {
            SequenceKind::Keyboard => (self.keyboard.current_step(), self.keyboard.total_steps()),
            SequenceKind::Mouse => (self.mouse.current_step(), self.mouse.total_steps()),
        }
    }

    fn apply(&self, kind: SequenceKind, outcome: StepOutcome, timestamp: u64, now: Instant) {
        let (step, total) = self.counts(kind);
        match outcome {
            StepOutcome::Ignored => {}
            StepOutcome::Advanced => {
                crate::debug!("{:?} exit sequence at step {}/{}", kind, step, total);
                self.emit_in_progress(kind, now);
            }
            StepOutcome::Reset => {
                crate::debug!("{:?} exit sequence reset by mismatched input", kind);
                self.emit_idle(kind);
            }
            StepOutcome::Completed => {
                crate::info!("{:?} exit sequence completed", kind);
                self.emitter.emit_exit_progress(ExitProgress {
                    sequence_kind: kind,
                    current_step: total,
                    total_steps: total,
                    remaining_time: Duration::ZERO,
                    state: ProgressState::Completed,
                });
                self.emitter.emit_exit_requested(ExitRequest {
                    sequence: kind,
                    timestamp,
                });
            }
        }
    }

    fn emit_in_progress(&self, kind: SequenceKind, now: Instant) {
        let (step, total) = self.counts(kind);
        let remaining = match kind {
            SequenceKind::Keyboard => self.keyboard.remaining(now),
            SequenceKind::Mouse => self.mouse.remaining(now),
        };
        self.emitter.emit_exit_progress(ExitProgress {
            sequence_kind: kind,
            current_step: step,
            total_steps: total,
            remaining_time: remaining,
            state: ProgressState::InProgress,
        });
    }

    fn emit_idle(&self, kind: SequenceKind) {
        let (_, total) = self.counts(kind);
        self.emitter.emit_exit_progress(ExitProgress {
            sequence_kind: kind,
            current_step: 0,
            total_steps: total,
            remaining_time: Duration::ZERO,
            state: ProgressState::Idle,
        });
    }
}

#[cfg(test)]
#[path = "detector_test.rs"]
mod tests;
