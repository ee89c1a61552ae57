//! Repository identity resolution.

use crate::models::RepoId;
use crate::storage::MemoryStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Maximum number of directories examined per resolution.
pub const MAX_HOPS: usize = 20;

/// Entry whose presence marks a repository root.
pub const REPO_MARKER: &str = ".git";

/// Maps a path to the identity of its enclosing repository.
#[derive(Debug, Clone)]
pub struct RepoResolver {
    store: Arc<MemoryStore>,
}

impl RepoResolver {
    /// Creates a resolver that records resolved roots in `store`.
    #[must_use]
    pub const fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Resolves the repository enclosing `path`.
    ///
    /// Returns `None` when no marker is found within [`MAX_HOPS`] directories
    /// or before reaching the filesystem root. Failing to record the root in
    /// the repository map is logged and does not affect the result.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> Option<RepoId> {
        self.resolve_with_root(path).map(|(id, _)| id)
    }

    /// Resolves the repository enclosing `path`, also returning its root.
    #[must_use]
    pub fn resolve_with_root(&self, path: &Path) -> Option<(RepoId, PathBuf)> {
        let root = find_repo_root(path)?;
        let id = RepoId::from_root(&root);
        if let Err(e) = self.store.record_repo_path(&id, &root) {
            warn!(repo = %id, root = %root.display(), error = %e, "Failed to record repository path");
        }
        debug!(repo = %id, root = %root.display(), "Resolved repository");
        Some((id, root))
    }
}

/// Finds the nearest ancestor directory containing [`REPO_MARKER`].
///
/// The search starts at `path` itself if it is a directory, otherwise at its
/// parent. The returned root is canonical when the filesystem allows it.
#[must_use]
pub fn find_repo_root(path: &Path) -> Option<PathBuf> {
    let start = if path.is_dir() {
        path.to_path_buf()
    } else {
        path.parent()?.to_path_buf()
    };
    let start = std::fs::canonicalize(&start)
        .or_else(|_| std::path::absolute(&start))
        .unwrap_or(start);

    start
        .ancestors()
        .take(MAX_HOPS)
        .find(|dir| dir.join(REPO_MARKER).exists())
        .map(Path::to_path_buf)
}
