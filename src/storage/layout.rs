//! On-disk layout of the data root.
//!
//! ```text
//! <data_root>/
//!   repos.json
//!   runtime/status.json
//!   agent-memory/<repo_id>/raw-logs/<source file name>
//!   agent-memory/<repo_id>/memory/{attempts,failures,decisions}.md
//!   agent-memory/<repo_id>/memory/state.json
//!   agent-memory/<repo_id>/memory/failure_signatures.json
//! ```

use crate::models::{MemoryKind, RepoId};
use std::path::{Path, PathBuf};

/// Name of the repository path map.
pub const REPOS_FILE: &str = "repos.json";
/// Directory holding one subdirectory per repository.
pub const MEMORY_ROOT_DIR: &str = "agent-memory";
/// Per-repository directory of raw captures.
pub const RAW_DIR: &str = "raw-logs";
/// Per-repository directory of memory documents.
pub const MEMORY_DIR: &str = "memory";
/// Free-form state document.
pub const STATE_FILE: &str = "state.json";
/// Failure signature set.
pub const SIGNATURES_FILE: &str = "failure_signatures.json";

/// Resolves every path the store owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    /// Creates a layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The data root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `repos.json`.
    #[must_use]
    pub fn repos_file(&self) -> PathBuf {
        self.root.join(REPOS_FILE)
    }

    /// `runtime/status.json`.
    #[must_use]
    pub fn runtime_status_file(&self) -> PathBuf {
        self.root.join("runtime").join("status.json")
    }

    /// `agent-memory/`.
    #[must_use]
    pub fn memory_root(&self) -> PathBuf {
        self.root.join(MEMORY_ROOT_DIR)
    }

    /// `agent-memory/<repo>/`.
    #[must_use]
    pub fn repo_dir(&self, repo: &RepoId) -> PathBuf {
        self.memory_root().join(repo.as_str())
    }

    /// `agent-memory/<repo>/raw-logs/`.
    #[must_use]
    pub fn raw_dir(&self, repo: &RepoId) -> PathBuf {
        self.repo_dir(repo).join(RAW_DIR)
    }

    /// `agent-memory/<repo>/memory/`.
    #[must_use]
    pub fn memory_dir(&self, repo: &RepoId) -> PathBuf {
        self.repo_dir(repo).join(MEMORY_DIR)
    }

    /// Log document for one memory kind.
    #[must_use]
    pub fn log_file(&self, repo: &RepoId, kind: MemoryKind) -> PathBuf {
        self.memory_dir(repo).join(kind.file_name())
    }

    /// `state.json`.
    #[must_use]
    pub fn state_file(&self, repo: &RepoId) -> PathBuf {
        self.memory_dir(repo).join(STATE_FILE)
    }

    /// `failure_signatures.json`.
    #[must_use]
    pub fn signatures_file(&self, repo: &RepoId) -> PathBuf {
        self.memory_dir(repo).join(SIGNATURES_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = StoreLayout::new("/data");
        let repo = RepoId::parse("abc123").unwrap();

        assert_eq!(layout.repos_file(), PathBuf::from("/data/repos.json"));
        assert_eq!(
            layout.runtime_status_file(),
            PathBuf::from("/data/runtime/status.json")
        );
        assert_eq!(
            layout.raw_dir(&repo),
            PathBuf::from("/data/agent-memory/abc123/raw-logs")
        );
        assert_eq!(
            layout.log_file(&repo, MemoryKind::Failure),
            PathBuf::from("/data/agent-memory/abc123/memory/failures.md")
        );
        assert_eq!(
            layout.signatures_file(&repo),
            PathBuf::from("/data/agent-memory/abc123/memory/failure_signatures.json")
        );
    }
}
