//! Latest-wins scheduling for debounced filter re-evaluation.
//!
//! Rapid criteria changes within the coalescing window collapse into a
//! single evaluation of the most recent snapshot. Scheduling supersedes
//! any pending, not-yet-fired request outright; superseded snapshots are
//! discarded, never queued or merged. The scheduler holds no timers and
//! spawns no threads: the caller drives it with its own clock, which keeps
//! the behavior deterministic and testable.

use crate::filter::FilterCriteria;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Pending {
    criteria: FilterCriteria,
    due_at: Instant,
}

/// Debounced, latest-wins holder of the next filter evaluation.
#[derive(Debug)]
pub struct FilterScheduler {
    window: Duration,
    pending: Option<Pending>,
}

impl FilterScheduler {
    /// Create a scheduler with the configured coalescing window.
    pub fn new(config: &crate::types::Config) -> Self {
        Self::with_window(config.debounce_window())
    }

    /// Create a scheduler with an explicit window.
    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// The coalescing window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Schedule an evaluation of `criteria`, superseding any pending one
    /// and restarting the window from `now`.
    pub fn schedule(&mut self, criteria: FilterCriteria, now: Instant) {
        self.pending = Some(Pending {
            criteria,
            due_at: now + self.window,
        });
    }

    /// Whether an evaluation is pending (fired or not).
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether the pending evaluation's window has elapsed at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| now >= pending.due_at)
    }

    /// Take the pending criteria if due, leaving the scheduler idle.
    /// Returns `None` while the window is still open or nothing is
    /// scheduled.
    pub fn take_due(&mut self, now: Instant) -> Option<FilterCriteria> {
        if self.is_due(now) {
            self.pending.take().map(|pending| pending.criteria)
        } else {
            None
        }
    }

    /// Discard any pending evaluation. Returns whether one was discarded.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }
}
