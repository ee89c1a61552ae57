//! Configuration management.
//!
//! The configuration is resolved once at startup and treated as immutable
//! by the pipeline. Sources, in increasing precedence:
//!
//! 1. Built-in defaults
//! 2. TOML file (`-c FILE`, `AGENTLOG_CONFIG_PATH`, or the platform config dir)
//! 3. Environment overrides (`AGENTLOG_DATA_ROOT`, `AGENTLOG_WATCH_PATHS`)

mod settings;

pub use settings::{DetectionSettings, LoggingSettings, MetricsSettings, PipelineSettings};

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the data root.
pub const ENV_DATA_ROOT: &str = "AGENTLOG_DATA_ROOT";
/// Environment variable overriding the watch roots (`:`-separated).
pub const ENV_WATCH_PATHS: &str = "AGENTLOG_WATCH_PATHS";
/// Environment variable naming the configuration file.
pub const ENV_CONFIG_PATH: &str = "AGENTLOG_CONFIG_PATH";

/// Main configuration for agentlog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentlogConfig {
    /// Root directory owned by the memory store.
    pub data_root: PathBuf,
    /// Directory trees watched recursively.
    pub watch_paths: Vec<PathBuf>,
    /// Accepted file extensions (with or without the leading dot).
    pub extensions: Vec<String>,
    /// Path substrings that exclude a change from consideration.
    pub ignore_patterns: Vec<String>,
    /// Activity detection heuristics.
    pub detection: DetectionSettings,
    /// Pipeline timing and queueing.
    pub pipeline: PipelineSettings,
    /// Log output.
    pub logging: LoggingSettings,
    /// Metrics exporter.
    pub metrics: MetricsSettings,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Data root.
    pub data_root: Option<String>,
    /// Watch roots.
    pub watch_paths: Option<Vec<String>>,
    /// Accepted extensions.
    pub extensions: Option<Vec<String>>,
    /// Ignore substrings.
    pub ignore_patterns: Option<Vec<String>>,
    /// Detection section.
    pub detection: Option<ConfigFileDetection>,
    /// Pipeline section.
    pub pipeline: Option<ConfigFilePipeline>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
    /// Metrics section.
    pub metrics: Option<MetricsSettings>,
}

/// Detection section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileDetection {
    /// Churn window in seconds.
    pub churn_window_seconds: Option<u64>,
    /// Minimum events for churn.
    pub min_fs_events: Option<usize>,
    /// Activation threshold.
    pub activation_threshold: Option<f64>,
    /// Process indicator substrings.
    pub process_indicators: Option<Vec<String>>,
    /// Confidence for a matching process.
    pub process_confidence: Option<f64>,
    /// Failure indicator substrings.
    pub failure_indicators: Option<Vec<String>>,
}

/// Pipeline section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFilePipeline {
    /// Post-capture throttle in seconds.
    pub capture_delay_seconds: Option<f64>,
    /// Stream idle timeout in milliseconds.
    pub poll_interval_ms: Option<u64>,
    /// Queue capacity.
    pub queue_capacity: Option<usize>,
}

impl Default for AgentlogConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            watch_paths: Vec::new(),
            extensions: [".log", ".txt", ".md", ".py"]
                .into_iter()
                .map(String::from)
                .collect(),
            ignore_patterns: [".git", "node_modules", "__pycache__", ".venv"]
                .into_iter()
                .map(String::from)
                .collect(),
            detection: DetectionSettings::default(),
            pipeline: PipelineSettings::default(),
            logging: LoggingSettings::default(),
            metrics: MetricsSettings::default(),
        }
    }
}

impl AgentlogConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        let mut config = Self::from_toml(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parses configuration from TOML text without consulting the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration file.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;
        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. `AGENTLOG_CONFIG_PATH`
    /// 2. Platform-specific config dir (`~/.config/agentlog/config.toml` on Linux)
    ///
    /// Returns defaults (with environment overrides) if no file is found.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load_default() -> Result<Self> {
        if let Ok(config_path) = std::env::var(ENV_CONFIG_PATH) {
            if !config_path.trim().is_empty() {
                return Self::load_from_file(Path::new(&config_path));
            }
        }

        if let Some(base_dirs) = directories::BaseDirs::new() {
            let platform_config = base_dirs.config_dir().join("agentlog").join("config.toml");
            if platform_config.exists() {
                return Self::load_from_file(&platform_config);
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Converts a `ConfigFile` to `AgentlogConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(data_root) = file.data_root {
            config.data_root = expand_tilde(&data_root);
        }
        if let Some(paths) = file.watch_paths {
            config.watch_paths = paths.iter().map(|p| expand_tilde(p)).collect();
        }
        if let Some(extensions) = file.extensions {
            config.extensions = extensions;
        }
        if let Some(ignore) = file.ignore_patterns {
            config.ignore_patterns = ignore;
        }
        if let Some(detection) = file.detection {
            let target = &mut config.detection;
            if let Some(v) = detection.churn_window_seconds {
                target.churn_window_seconds = v;
            }
            if let Some(v) = detection.min_fs_events {
                target.min_fs_events = v;
            }
            if let Some(v) = detection.activation_threshold {
                target.activation_threshold = v;
            }
            if let Some(v) = detection.process_indicators {
                target.process_indicators = v;
            }
            if let Some(v) = detection.process_confidence {
                target.process_confidence = v;
            }
            if let Some(v) = detection.failure_indicators {
                target.failure_indicators = v;
            }
        }
        if let Some(pipeline) = file.pipeline {
            let target = &mut config.pipeline;
            if let Some(v) = pipeline.capture_delay_seconds {
                target.capture_delay_seconds = v;
            }
            if let Some(v) = pipeline.poll_interval_ms {
                target.poll_interval_ms = v;
            }
            if let Some(v) = pipeline.queue_capacity {
                target.queue_capacity = v;
            }
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }
        if let Some(metrics) = file.metrics {
            config.metrics = metrics;
        }

        config
    }

    /// Applies `AGENTLOG_DATA_ROOT` and `AGENTLOG_WATCH_PATHS`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var(ENV_DATA_ROOT) {
            if !root.trim().is_empty() {
                self.data_root = expand_tilde(root.trim());
            }
        }
        if let Ok(paths) = std::env::var(ENV_WATCH_PATHS) {
            let parsed = parse_path_list(&paths);
            if !parsed.is_empty() {
                self.watch_paths = parsed;
            }
        }
    }

    /// Checks the values the pipeline relies on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));

        if self.watch_paths.is_empty() {
            return fail("watch_paths must name at least one directory");
        }
        if self.extensions.iter().all(|e| e.trim_start_matches('.').is_empty()) {
            return fail("extensions must name at least one file extension");
        }
        if self.data_root.as_os_str().is_empty() {
            return fail("data_root must not be empty");
        }

        let detection = &self.detection;
        if detection.churn_window_seconds == 0 {
            return fail("detection.churn_window_seconds must be greater than zero");
        }
        if detection.min_fs_events == 0 {
            return fail("detection.min_fs_events must be at least 1");
        }
        if !(0.0..=1.0).contains(&detection.activation_threshold) {
            return fail("detection.activation_threshold must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&detection.process_confidence) {
            return fail("detection.process_confidence must be within [0, 1]");
        }

        let pipeline = &self.pipeline;
        if !pipeline.capture_delay_seconds.is_finite() || pipeline.capture_delay_seconds < 0.0 {
            return fail("pipeline.capture_delay_seconds must be a non-negative number");
        }
        if pipeline.poll_interval_ms == 0 {
            return fail("pipeline.poll_interval_ms must be greater than zero");
        }
        if pipeline.queue_capacity == 0 {
            return fail("pipeline.queue_capacity must be greater than zero");
        }

        Ok(())
    }

    /// Sets the data root.
    #[must_use]
    pub fn with_data_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_root = path.into();
        self
    }

    /// Sets the watch roots.
    #[must_use]
    pub fn with_watch_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.watch_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the accepted extensions.
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }
}

/// Returns `~/agentlog_data`, or `./agentlog_data` without a home directory.
fn default_data_root() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("agentlog_data"),
        |b| b.home_dir().join("agentlog_data"),
    )
}

/// Expands a leading `~` to the home directory.
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    let home = || directories::BaseDirs::new().map(|b| b.home_dir().to_path_buf());
    if path == "~" {
        return home().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Splits a `:`-separated list of paths, skipping empty items.
fn parse_path_list(raw: &str) -> Vec<PathBuf> {
    raw.split(':')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(expand_tilde)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AgentlogConfig {
        AgentlogConfig::new()
            .with_data_root("/tmp/agentlog-test")
            .with_watch_paths(["/tmp/code"])
    }

    #[test]
    fn test_from_toml_full() {
        let config = AgentlogConfig::from_toml(
            r#"
            data_root = "/var/lib/agentlog"
            watch_paths = ["/srv/code", "/home/dev/work"]
            extensions = [".log"]
            ignore_patterns = ["target"]

            [detection]
            churn_window_seconds = 30
            min_fs_events = 3
            activation_threshold = 0.6
            process_indicators = ["aider"]
            process_confidence = 0.9
            failure_indicators = ["panicked"]

            [pipeline]
            capture_delay_seconds = 0.5
            poll_interval_ms = 200
            queue_capacity = 16

            [logging]
            level = "debug"
            format = "json"

            [metrics]
            enabled = true
            port = 9464
            "#,
        )
        .unwrap();

        assert_eq!(config.data_root, PathBuf::from("/var/lib/agentlog"));
        assert_eq!(config.watch_paths.len(), 2);
        assert_eq!(config.extensions, vec![".log"]);
        assert_eq!(config.ignore_patterns, vec!["target"]);
        assert_eq!(config.detection.churn_window_seconds, 30);
        assert_eq!(config.detection.min_fs_events, 3);
        assert!((config.detection.activation_threshold - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.detection.process_indicators, vec!["aider"]);
        assert_eq!(config.detection.failure_indicators, vec!["panicked"]);
        assert_eq!(config.pipeline.queue_capacity, 16);
        assert_eq!(config.pipeline.poll_interval_ms, 200);
        assert_eq!(config.logging.format.as_deref(), Some("json"));
        assert_eq!(config.metrics.port, Some(9464));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial_keeps_defaults() {
        let config = AgentlogConfig::from_toml("watch_paths = [\"/srv/code\"]").unwrap();
        let defaults = AgentlogConfig::default();
        assert_eq!(config.extensions, defaults.extensions);
        assert_eq!(config.detection, defaults.detection);
        assert_eq!(config.pipeline, defaults.pipeline);
    }

    #[test]
    fn test_from_toml_rejects_unknown_fields() {
        assert!(AgentlogConfig::from_toml("watch_path = [\"/x\"]").is_err());
        assert!(AgentlogConfig::from_toml("[detection]\nthreshold = 0.5").is_err());
    }

    #[test]
    fn test_validate_accepts_defaults_with_watch_paths() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = valid();
        config.watch_paths.clear();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = valid();
        config.extensions = vec![".".to_string()];
        assert!(config.validate().is_err());

        let mut config = valid();
        config.detection.churn_window_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.detection.min_fs_events = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.detection.activation_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.detection.process_confidence = -0.1;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.pipeline.capture_delay_seconds = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.pipeline.queue_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.pipeline.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_path_list() {
        let paths = parse_path_list("/a: /b ::/c");
        assert_eq!(
            paths,
            vec![PathBuf::from("/a"), PathBuf::from("/b"), PathBuf::from("/c")]
        );
    }

    #[test]
    fn test_expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/srv/code"), PathBuf::from("/srv/code"));
        assert_eq!(expand_tilde("relative/dir"), PathBuf::from("relative/dir"));
    }
}
