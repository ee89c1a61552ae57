//! Configuration sections.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Activity detection heuristics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionSettings {
    /// Length of the churn window in seconds.
    pub churn_window_seconds: u64,
    /// Minimum notifications inside the window for churn to saturate.
    pub min_fs_events: usize,
    /// Minimum score that triggers a capture.
    pub activation_threshold: f64,
    /// Substrings of process names or command lines that indicate an agent.
    pub process_indicators: Vec<String>,
    /// Confidence reported when an indicator process is running.
    pub process_confidence: f64,
    /// Substrings that classify a captured file as a failure.
    pub failure_indicators: Vec<String>,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            churn_window_seconds: 60,
            min_fs_events: 5,
            activation_threshold: 0.5,
            process_indicators: ["cursor", "vscode", "zed", "pycharm", "claude", "codex", "aider"]
                .into_iter()
                .map(String::from)
                .collect(),
            process_confidence: 0.7,
            failure_indicators: vec!["error".to_string()],
        }
    }
}

impl DetectionSettings {
    /// Returns the churn window as a duration.
    #[must_use]
    pub const fn churn_window(&self) -> Duration {
        Duration::from_secs(self.churn_window_seconds)
    }
}

/// Pipeline timing and queueing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSettings {
    /// Throttle applied after each successful capture, in seconds.
    pub capture_delay_seconds: f64,
    /// Idle timeout of the notification stream, in milliseconds.
    pub poll_interval_ms: u64,
    /// Capacity of the observer-to-coordinator queue.
    pub queue_capacity: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            capture_delay_seconds: 1.0,
            poll_interval_ms: 1000,
            queue_capacity: 1024,
        }
    }
}

impl PipelineSettings {
    /// Returns the post-capture throttle.
    #[must_use]
    pub fn capture_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.capture_delay_seconds).unwrap_or(Duration::ZERO)
    }

    /// Returns the stream idle timeout.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Log output settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    /// Default filter directive (e.g. `info`, `agentlog=debug`).
    pub level: Option<String>,
    /// Output format: `pretty` or `json`.
    pub format: Option<String>,
    /// Optional log file; stderr when absent.
    pub file: Option<PathBuf>,
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSettings {
    /// Whether metrics are recorded.
    pub enabled: Option<bool>,
    /// Port of the HTTP scrape listener.
    pub port: Option<u16>,
}
