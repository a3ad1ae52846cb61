//! Ordered sequence with a sliding timeout.
//!
//! One instance tracks one exit path. The caller decides which inputs are
//! relevant and supplies a predicate telling whether an input matches a step;
//! the machine owns the step counter and the single deadline.

use std::time::Duration;
use tokio::time::Instant;

/// What one relevant input did to the sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// No state change
    Ignored,
    /// Moved to the next step, deadline refreshed
    Advanced,
    /// Mismatch while in progress, back to step 0
    Reset,
    /// Last step matched; the sequence has re-armed at step 0
    Completed,
}

#[derive(Debug, Clone)]
pub struct OrderedSequence<S> {
    steps: Vec<S>,
    timeout: Duration,
    position: usize,
    deadline: Option<Instant>,
}

impl<S> OrderedSequence<S> {
    pub fn new(steps: Vec<S>, timeout: Duration) -> Self {
        Self {
            steps,
            timeout,
            position: 0,
            deadline: None,
        }
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn current_step(&self) -> usize {
        self.position
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Live deadline; only set while in progress
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline
            .map(|d| d.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Feed one relevant input. Any mismatch while in progress resets to
    /// step 0, including a repeat of the step just matched.
    pub fn observe<F>(&mut self, now: Instant, matches: F) -> StepOutcome
    where
        F: Fn(&S) -> bool,
    {
        if self.steps.is_empty() {
            return StepOutcome::Ignored;
        }

        if matches(&self.steps[self.position]) {
            self.position += 1;
            if self.position == self.steps.len() {
                self.reset();
                return StepOutcome::Completed;
            }
            self.deadline = Some(now + self.timeout);
            return StepOutcome::Advanced;
        }

        if self.position == 0 {
            return StepOutcome::Ignored;
        }

        self.reset();
        StepOutcome::Reset
    }

    /// Reset if the deadline has passed. Returns true when a reset happened.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.reset();
                true
            }
            _ => false,
        }
    }

    /// Back to step 0 with no live timer
    pub fn reset(&mut self) {
        self.position = 0;
        self.deadline = None;
    }
}
