//! Repository identity and git context.

mod context;
mod resolver;

pub use context::current_branch;
pub use resolver::{MAX_HOPS, REPO_MARKER, RepoResolver, find_repo_root};
