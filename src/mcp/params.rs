//! Typed request parameters.
//!
//! Every method's params are deserialized into one of these structs before
//! reaching the service, so handlers never inspect raw JSON.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;

use crate::models::MemoryKind;

/// Params of `repos/resolve`.
#[derive(Debug, Deserialize)]
pub struct ResolveParams {
    /// Path to resolve.
    pub path: PathBuf,
}

/// Params carrying only a repository id.
#[derive(Debug, Deserialize)]
pub struct RepoParams {
    /// Repository id.
    pub repo_id: String,
}

/// Params of `memory/append` and of the `add_memory` tool.
#[derive(Debug, Deserialize)]
pub struct AppendParams {
    /// Repository id.
    pub repo_id: String,
    /// Entry kind.
    pub kind: MemoryKind,
    /// Entry text.
    pub text: String,
    /// Optional entry timestamp; defaults to now.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Params of `memory/capture`.
#[derive(Debug, Deserialize)]
pub struct CaptureParams {
    /// Repository id.
    pub repo_id: String,
    /// File to copy.
    pub path: PathBuf,
}

/// Params of `state/write`.
#[derive(Debug, Deserialize)]
pub struct StateParams {
    /// Repository id.
    pub repo_id: String,
    /// New state document.
    pub state: Value,
}

/// Params of `resources/read`.
#[derive(Debug, Deserialize)]
pub struct ReadResourceParams {
    /// Resource URI.
    pub uri: String,
}

/// Params of `tools/call`.
#[derive(Debug, Deserialize)]
pub struct CallToolParams {
    /// Tool name.
    pub name: String,
    /// Tool arguments.
    #[serde(default)]
    pub arguments: Value,
}
