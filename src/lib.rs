//! # agentlog
//!
//! Detects when an autonomous coding agent is working inside a local
//! repository and keeps an append-only memory of that work.
//!
//! agentlog watches a set of directory trees for file modifications, fuses
//! the modification density with evidence from running processes into an
//! activity score, and, when the score clears the activation threshold,
//! captures the modified file into a per-repository journal of attempts,
//! failures and decisions.
//!
//! ## Pipeline
//!
//! ```text
//! notify ──► ChangeObserver ──► bounded queue ──► Coordinator
//!                                                   │ ActivityScorer + ProcessProbe
//!                                                   ▼
//!                                          RepoResolver ──► MemoryStore
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use agentlog::{AgentlogConfig, MonitorService};
//!
//! let service = MonitorService::new(AgentlogConfig::load_default()?)?;
//! service.start()?;
//! // ...
//! service.stop();
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// multiple_crate_versions is inherently crate-level (detects duplicate transitive dependencies).
// Current duplicates come from the git2 and notify dependency trees.
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod cli;
pub mod config;
pub mod detector;
pub mod mcp;
pub mod models;
pub mod observability;
pub mod repo;
pub mod services;
pub mod storage;
pub mod watcher;

// Re-exports for convenience
pub use config::AgentlogConfig;
pub use detector::{ActivityScorer, FixedProbe, ProcessProbe, SystemProcessProbe};
pub use models::{
    ActivityStatus, ChangeNotification, ControlStatus, MemoryEntry, MemoryKind, MemorySnapshot,
    RepoId,
};
pub use repo::RepoResolver;
pub use services::{Coordinator, MonitorService, PipelineOutcome, RuntimeState};
pub use storage::MemoryStore;
pub use watcher::{ChangeObserver, ChangeStream, ObserverStart, PathFilter, StopSignal};

/// Error type for agentlog operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Unsafe repository ids, sources without a file name, malformed RPC params |
/// | `OperationFailed` | I/O errors in the store, watcher registration failures |
/// | `InvalidConfig` | Missing watch paths, thresholds outside `[0, 1]`, zero windows |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - A repository id contains characters other than alphanumerics, `-` and `_`
    /// - A capture source has no file name component
    /// - A memory kind string is not `attempt`, `failure` or `decision`
    /// - None of the configured watch roots exist
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - Copying, appending or writing under the data root fails
    /// - The data root cannot be created
    /// - The filesystem watcher cannot be created
    /// - Logging or metrics initialization fails
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Configuration is unusable.
    ///
    /// Only raised at startup; the running pipeline never produces it.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Builds an [`Error::OperationFailed`] from an operation name and any displayable cause.
    pub fn operation(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for agentlog operations.
pub type Result<T> = std::result::Result<T, Error>;
