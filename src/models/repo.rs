//! Repository identities.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// Number of hex characters kept from the root path digest.
pub const REPO_ID_LEN: usize = 12;

/// Stable short identity of a repository, derived from its canonical root path.
///
/// The identity is content-addressed by path, not by repository content: a
/// moved or renamed root becomes a new identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoId(String);

impl RepoId {
    /// Derives the identity of a repository root.
    #[must_use]
    pub fn from_root(root: &Path) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(root.to_string_lossy().as_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(digest[..REPO_ID_LEN].to_string())
    }

    /// Parses an identity supplied by a caller.
    ///
    /// # Security
    ///
    /// Identities become directory names under the data root, so only
    /// alphanumeric characters, dashes and underscores are accepted.
    pub fn parse(id: &str) -> Result<Self> {
        if is_safe_component(id) {
            Ok(Self(id.to_string()))
        } else {
            Err(Error::InvalidInput(format!(
                "repository id contains invalid characters: {id}"
            )))
        }
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Checks that a name is usable as a single path component.
fn is_safe_component(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
