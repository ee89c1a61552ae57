//! Git context attached to captured entries.

use git2::Repository;
use std::path::Path;

/// Returns the checked-out branch of the repository at `root`.
///
/// Returns `None` if the directory is not a git repository, HEAD is
/// detached, or the branch has no commits yet.
#[must_use]
pub fn current_branch(root: &Path) -> Option<String> {
    let repo = Repository::open(root).ok()?;
    let head = repo.head().ok()?;
    if !head.is_branch() {
        return None;
    }
    head.shorthand().map(String::from)
}
