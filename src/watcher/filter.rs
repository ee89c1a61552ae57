//! Ignore and extension filtering for change notifications.

use std::path::{Path, PathBuf};

/// Predicate deciding whether a changed path is worth considering.
///
/// A path is accepted iff its extension is in the accepted set, none of
/// the ignore substrings occurs anywhere in its string form, and it does not
/// lie under an excluded directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFilter {
    extensions: Vec<String>,
    ignore_patterns: Vec<String>,
    excluded_dirs: Vec<PathBuf>,
}

impl PathFilter {
    /// Creates a filter.
    ///
    /// Extensions may be given with or without the leading dot and are
    /// compared case-insensitively. Empty entries are discarded.
    #[must_use]
    pub fn new<E, I>(extensions: E, ignore_patterns: I) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        let ignore_patterns = ignore_patterns
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        Self {
            extensions,
            ignore_patterns,
            excluded_dirs: Vec::new(),
        }
    }

    /// Rejects every path under `dir`, compared component-wise.
    #[must_use]
    pub fn exclude_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if !dir.as_os_str().is_empty() && !self.excluded_dirs.contains(&dir) {
            self.excluded_dirs.push(dir);
        }
        self
    }

    /// Returns true if the path qualifies.
    #[must_use]
    pub fn accepts(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        if !self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
            return false;
        }

        if self.excluded_dirs.iter().any(|dir| path.starts_with(dir)) {
            return false;
        }

        let display = path.to_string_lossy();
        !self
            .ignore_patterns
            .iter()
            .any(|pattern| display.contains(pattern.as_str()))
    }

    /// Returns the normalized accepted extensions (no leading dot).
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}
