//! Process evidence: is a known coding agent or editor running?

use std::ffi::OsStr;
use sysinfo::{ProcessRefreshKind, RefreshKind, System, UpdateKind};
use tracing::trace;

/// Source of process-based confidence that an agent is active.
pub trait ProcessProbe: Send + Sync {
    /// Returns a confidence in `[0, 1]`.
    fn confidence(&self) -> f64;
}

/// Probe that enumerates the live process table on every call.
///
/// A process matches when any indicator occurs in its lowercased name or
/// lowercased space-joined command line. Processes that vanish or cannot be
/// inspected mid-enumeration are skipped.
#[derive(Debug, Clone)]
pub struct SystemProcessProbe {
    indicators: Vec<String>,
    confidence: f64,
}

impl SystemProcessProbe {
    /// Creates a probe reporting `confidence` when an indicator matches.
    #[must_use]
    pub fn new<I>(indicators: I, confidence: f64) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self {
            indicators: indicators
                .into_iter()
                .map(|i| i.as_ref().trim().to_lowercase())
                .filter(|i| !i.is_empty())
                .collect(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

impl ProcessProbe for SystemProcessProbe {
    fn confidence(&self) -> f64 {
        if self.indicators.is_empty() {
            return 0.0;
        }

        let system = System::new_with_specifics(
            RefreshKind::new().with_processes(ProcessRefreshKind::new().with_cmd(UpdateKind::Always)),
        );
        let matched = system.processes().values().any(|process| {
            let name = lossy(process.name());
            let cmdline = process
                .cmd()
                .iter()
                .map(lossy)
                .collect::<Vec<_>>()
                .join(" ");
            let hit = matches_indicator(&name, &cmdline, &self.indicators);
            if hit {
                trace!(pid = %process.pid(), name = %name, "Agent process detected");
            }
            hit
        });

        if matched { self.confidence } else { 0.0 }
    }
}

/// Probe returning a constant, for tests and for disabling process detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedProbe(pub f64);

impl ProcessProbe for FixedProbe {
    fn confidence(&self) -> f64 {
        self.0
    }
}

/// Returns true if any lowercase indicator occurs in the name or command line.
#[must_use]
pub fn matches_indicator(name: &str, cmdline: &str, indicators: &[String]) -> bool {
    let name = name.to_lowercase();
    let cmdline = cmdline.to_lowercase();
    indicators
        .iter()
        .any(|i| name.contains(i.as_str()) || cmdline.contains(i.as_str()))
}

fn lossy(value: impl AsRef<OsStr>) -> String {
    value.as_ref().to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn indicators() -> Vec<String> {
        ["cursor", "vscode", "zed", "pycharm"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test_case("Cursor", "", true ; "name case insensitive")]
    #[test_case("node", "/usr/share/code/resources/app/out/vscode-server.js", true ; "command line")]
    #[test_case("bash", "-c ls", false ; "unrelated")]
    #[test_case("", "", false ; "empty process")]
    fn test_matches_indicator(name: &str, cmdline: &str, expected: bool) {
        assert_eq!(matches_indicator(name, cmdline, &indicators()), expected);
    }

    #[test]
    fn test_fixed_probe() {
        assert!((FixedProbe(0.7).confidence() - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_system_probe_without_indicators_is_zero() {
        let probe = SystemProcessProbe::new(Vec::<String>::new(), 0.7);
        assert!(probe.confidence().abs() < f64::EPSILON);
    }

    #[test]
    fn test_system_probe_returns_zero_or_configured_confidence() {
        let probe = SystemProcessProbe::new(["cargo", "rustc"], 0.6);
        let value = probe.confidence();
        assert!(value.abs() < f64::EPSILON || (value - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let probe = SystemProcessProbe::new(["x"], 3.0);
        assert!((probe.confidence - 1.0).abs() < f64::EPSILON);
    }
}
