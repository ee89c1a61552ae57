//! Data models for agentlog.
//!
//! This module contains the value types shared by the watcher, the detector,
//! the store and the front ends.

mod activity;
mod memory;
mod repo;

pub use activity::{ActivityStatus, ChangeNotification, ControlStatus};
pub use memory::{
    LINE_ESCAPE, MemoryEntry, MemoryKind, MemorySnapshot, SIGNATURE_MAX_CHARS, failure_signature,
    parse_entries,
};
pub use repo::{REPO_ID_LEN, RepoId};
