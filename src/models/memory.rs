//! Memory kinds, journal entries and read snapshots.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length (in characters) of a failure signature.
pub const SIGNATURE_MAX_CHARS: usize = 100;

/// Prefix of the header line that opens every journal entry.
const ENTRY_HEADER: &str = "### ";

/// Prefix that keeps a body line from being read as an entry header.
pub const LINE_ESCAPE: char = '\\';

/// Journal categories kept per repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    /// Something the agent tried.
    #[serde(alias = "attempts")]
    Attempt,
    /// Something that went wrong.
    #[serde(alias = "failures")]
    Failure,
    /// A choice that was made and should be remembered.
    #[serde(alias = "decisions")]
    Decision,
}

impl MemoryKind {
    /// Returns all kinds in journal order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Attempt, Self::Failure, Self::Decision]
    }

    /// Returns the singular lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Attempt => "attempt",
            Self::Failure => "failure",
            Self::Decision => "decision",
        }
    }

    /// Returns the plural name used for the on-disk log and resource URIs.
    #[must_use]
    pub const fn plural(&self) -> &'static str {
        match self {
            Self::Attempt => "attempts",
            Self::Failure => "failures",
            Self::Decision => "decisions",
        }
    }

    /// Returns the log file name inside a repository's memory directory.
    #[must_use]
    pub const fn file_name(&self) -> &'static str {
        match self {
            Self::Attempt => "attempts.md",
            Self::Failure => "failures.md",
            Self::Decision => "decisions.md",
        }
    }

    /// Parses a kind, accepting singular or plural forms in any case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "attempt" | "attempts" => Some(Self::Attempt),
            "failure" | "failures" => Some(Self::Failure),
            "decision" | "decisions" => Some(Self::Decision),
            _ => None,
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Timestamp exactly as written in the entry header.
    pub timestamp: String,
    /// Entry body.
    pub text: String,
}

impl MemoryEntry {
    /// Creates an entry stamped with the given time, or now.
    #[must_use]
    pub fn new(text: impl Into<String>, timestamp: Option<DateTime<Utc>>) -> Self {
        let timestamp = timestamp.unwrap_or_else(Utc::now);
        Self {
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            text: text.into(),
        }
    }

    /// Renders the entry in its line-oriented on-disk form.
    ///
    /// Trailing whitespace of the body is dropped and the entry ends with a
    /// blank line, so a torn write can only damage the last entry. Body lines
    /// that start with the header prefix or the escape character are
    /// prefixed with [`LINE_ESCAPE`].
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!("{ENTRY_HEADER}{}\n", self.timestamp);
        for line in self.text.trim_end().lines() {
            if line.starts_with(ENTRY_HEADER) || line.starts_with(LINE_ESCAPE) {
                out.push(LINE_ESCAPE);
            }
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

/// Splits a journal log back into entries, in file order.
///
/// A header line is only recognised at the start of the log or after a
/// blank line.
#[must_use]
pub fn parse_entries(log: &str) -> Vec<MemoryEntry> {
    let mut entries = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;
    let mut previous_blank = true;

    for line in log.lines() {
        if previous_blank {
            if let Some(timestamp) = line.strip_prefix(ENTRY_HEADER) {
                if let Some((ts, body)) = current.take() {
                    entries.push(finish_entry(ts, &body));
                }
                current = Some((timestamp.to_string(), Vec::new()));
                previous_blank = false;
                continue;
            }
        }
        if let Some((_, body)) = current.as_mut() {
            body.push(line.strip_prefix(LINE_ESCAPE).unwrap_or(line));
        }
        previous_blank = line.trim().is_empty();
    }

    if let Some((ts, body)) = current {
        entries.push(finish_entry(ts, &body));
    }
    entries
}

fn finish_entry(timestamp: String, body: &[&str]) -> MemoryEntry {
    MemoryEntry {
        timestamp,
        text: body.join("\n").trim_end().to_string(),
    }
}

/// Derives the deduplication key of a failure body.
///
/// The key is the first line truncated to [`SIGNATURE_MAX_CHARS`]
/// characters. Empty text has no signature.
#[must_use]
pub fn failure_signature(text: &str) -> Option<String> {
    text.lines()
        .next()
        .map(|line| line.chars().take(SIGNATURE_MAX_CHARS).collect())
}

/// Read-only view of everything stored for one repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Full attempts log.
    pub attempts: String,
    /// Full failures log.
    pub failures: String,
    /// Full decisions log.
    pub decisions: String,
    /// Latest structured state document, if one was written.
    pub state: Option<serde_json::Value>,
    /// Recorded failure signatures in insertion order.
    pub signatures: Vec<String>,
}

impl MemorySnapshot {
    /// Returns the raw log text for a kind.
    #[must_use]
    pub fn log(&self, kind: MemoryKind) -> &str {
        match kind {
            MemoryKind::Attempt => &self.attempts,
            MemoryKind::Failure => &self.failures,
            MemoryKind::Decision => &self.decisions,
        }
    }

    /// Returns the parsed entries of a kind.
    #[must_use]
    pub fn entries(&self, kind: MemoryKind) -> Vec<MemoryEntry> {
        parse_entries(self.log(kind))
    }

    pub(crate) fn log_mut(&mut self, kind: MemoryKind) -> &mut String {
        match kind {
            MemoryKind::Attempt => &mut self.attempts,
            MemoryKind::Failure => &mut self.failures,
            MemoryKind::Decision => &mut self.decisions,
        }
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
            && self.failures.is_empty()
            && self.decisions.is_empty()
            && self.state.is_none()
            && self.signatures.is_empty()
    }
}
