//! Structured logging configuration.

use crate::config::LoggingSettings;
use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive.
pub const ENV_LOG_FILTER: &str = "AGENTLOG_LOG";

/// Output format of the log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name, falling back to [`LogFormat::Pretty`].
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Event filter.
    pub filter: EnvFilter,
    /// Output format.
    pub format: LogFormat,
    /// Log file; stderr when `None`.
    pub file: Option<std::path::PathBuf>,
}

impl LoggingConfig {
    /// Builds the logging configuration.
    ///
    /// Filter precedence: `AGENTLOG_LOG`, then `debug` when verbose, then the
    /// configured level, then `info`.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        let directive = std::env::var(ENV_LOG_FILTER)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default_directive(settings, verbose));
        let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

        Self {
            filter,
            format: settings
                .format
                .as_deref()
                .map(LogFormat::parse)
                .unwrap_or_default(),
            file: settings.file.clone(),
        }
    }
}

fn default_directive(settings: &LoggingSettings, verbose: bool) -> String {
    if verbose {
        return "debug".to_string();
    }
    settings
        .level
        .clone()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "info".to_string())
}
