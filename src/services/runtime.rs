//! In-process runtime state.

use crate::models::ActivityStatus;
use std::sync::{PoisonError, RwLock};

/// Latest activity score, overwritten on every scoring update.
#[derive(Debug, Default)]
pub struct RuntimeState {
    latest: RwLock<Option<ActivityStatus>>,
}

impl RuntimeState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the latest status.
    pub fn update(&self, status: ActivityStatus) {
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Some(status);
    }

    /// Returns the latest status, if a score has been computed.
    #[must_use]
    pub fn current(&self) -> Option<ActivityStatus> {
        *self.latest.read().unwrap_or_else(PoisonError::into_inner)
    }
}
