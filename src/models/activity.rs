//! Change notifications, activity status and control results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

/// A qualifying file modification, consumed once by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    /// Absolute path of the modified file.
    pub path: PathBuf,
    /// Monotonic detection time, used for churn windows.
    pub detected_at: Instant,
    /// Wall-clock detection time, used in persisted entries.
    pub observed_at: DateTime<Utc>,
}

impl ChangeNotification {
    /// Creates a notification detected now.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::at(path, Instant::now())
    }

    /// Creates a notification with an explicit monotonic detection time.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>, detected_at: Instant) -> Self {
        Self {
            path: path.into(),
            detected_at,
            observed_at: Utc::now(),
        }
    }
}

/// Latest activity score snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivityStatus {
    /// Activation score in `[0, 1]`.
    pub score: f64,
    /// When the score was computed.
    pub timestamp: DateTime<Utc>,
}

impl ActivityStatus {
    /// Creates a snapshot stamped now.
    #[must_use]
    pub fn now(score: f64) -> Self {
        Self {
            score,
            timestamp: Utc::now(),
        }
    }
}

/// Result of an idempotent start or stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlStatus {
    /// The pipeline was started.
    #[serde(rename = "started")]
    Started,
    /// Start was requested while already running.
    #[serde(rename = "already running")]
    AlreadyRunning,
    /// The pipeline was stopped.
    #[serde(rename = "stopped")]
    Stopped,
    /// Stop was requested while not running.
    #[serde(rename = "not running")]
    NotRunning,
}

impl ControlStatus {
    /// Returns the status string reported to callers.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::AlreadyRunning => "already running",
            Self::Stopped => "stopped",
            Self::NotRunning => "not running",
        }
    }
}

impl fmt::Display for ControlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
