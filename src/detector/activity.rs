//! Activity scoring over a sliding window of change notifications.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Weight of the process evidence in the score.
pub const PROCESS_WEIGHT: f64 = 0.7;
/// Weight of the filesystem churn in the score.
pub const CHURN_WEIGHT: f64 = 0.3;

/// Fuses process evidence with filesystem churn into a score in `[0, 1]`.
///
/// Timestamps passed to [`record_event`](Self::record_event) must be
/// non-decreasing.
#[derive(Debug, Clone)]
pub struct ActivityScorer {
    window: VecDeque<Instant>,
    duration: Duration,
    min_events: usize,
}

impl ActivityScorer {
    /// Creates a scorer with window length `duration` that saturates churn at
    /// `min_events` notifications.
    #[must_use]
    pub const fn new(duration: Duration, min_events: usize) -> Self {
        Self {
            window: VecDeque::new(),
            duration,
            min_events,
        }
    }

    /// Records a notification and evicts everything older than the window.
    pub fn record_event(&mut self, at: Instant) {
        self.window.push_back(at);
        let Some(cutoff) = at.checked_sub(self.duration) else {
            return;
        };
        while self.window.front().is_some_and(|t| *t < cutoff) {
            self.window.pop_front();
        }
    }

    /// Returns 1.0 when the window holds at least `min_events` entries.
    #[must_use]
    pub fn churn(&self) -> f64 {
        if !self.window.is_empty() && self.window.len() >= self.min_events {
            1.0
        } else {
            0.0
        }
    }

    /// Computes the score for the given process confidence.
    #[must_use]
    pub fn score(&self, process_confidence: f64) -> f64 {
        let p = if process_confidence.is_nan() {
            0.0
        } else {
            process_confidence.clamp(0.0, 1.0)
        };
        PROCESS_WEIGHT.mul_add(p, CHURN_WEIGHT * self.churn())
    }

    /// Number of notifications currently in the window.
    #[must_use]
    pub fn window_len(&self) -> usize {
        self.window.len()
    }
}
