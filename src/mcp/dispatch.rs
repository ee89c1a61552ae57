//! JSON-RPC method dispatch.
//!
//! Method names are parsed once into [`RpcMethod`] so the server matches on
//! variants instead of strings. To add a method, add a variant, extend
//! [`RpcMethod::from`] and handle it in the server's dispatcher.

use std::fmt;

/// JSON-RPC method identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RpcMethod {
    /// Handshake.
    Initialize,
    /// Health check.
    Ping,
    /// List known repositories.
    ListRepos,
    /// Resolve a path to a repository id.
    ResolveRepo,
    /// Read everything stored for a repository.
    ReadMemory,
    /// Append a memory entry.
    AppendMemory,
    /// Copy a file into a repository's raw area.
    CaptureRaw,
    /// Replace a repository's state document.
    WriteState,
    /// Report pipeline and activity status.
    Status,
    /// Start the background pipeline.
    StartWatcher,
    /// Stop the background pipeline.
    StopWatcher,
    /// List memory resources.
    ListResources,
    /// Read a memory resource.
    ReadResource,
    /// List tools.
    ListTools,
    /// Call a tool.
    CallTool,
    /// Unknown method (for error handling).
    Unknown(String),
}

impl RpcMethod {
    /// Returns the wire name of the method.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::Initialize => "initialize",
            Self::Ping => "ping",
            Self::ListRepos => "repos/list",
            Self::ResolveRepo => "repos/resolve",
            Self::ReadMemory => "memory/read",
            Self::AppendMemory => "memory/append",
            Self::CaptureRaw => "memory/capture",
            Self::WriteState => "state/write",
            Self::Status => "status",
            Self::StartWatcher => "watcher/start",
            Self::StopWatcher => "watcher/stop",
            Self::ListResources => "resources/list",
            Self::ReadResource => "resources/read",
            Self::ListTools => "tools/list",
            Self::CallTool => "tools/call",
            Self::Unknown(s) => s.as_str(),
        }
    }

    /// Returns true if this is a known method.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Returns all known methods.
    #[must_use]
    pub const fn known_methods() -> &'static [Self] {
        &[
            Self::Initialize,
            Self::Ping,
            Self::ListRepos,
            Self::ResolveRepo,
            Self::ReadMemory,
            Self::AppendMemory,
            Self::CaptureRaw,
            Self::WriteState,
            Self::Status,
            Self::StartWatcher,
            Self::StopWatcher,
            Self::ListResources,
            Self::ReadResource,
            Self::ListTools,
            Self::CallTool,
        ]
    }
}

impl From<&str> for RpcMethod {
    fn from(s: &str) -> Self {
        match s {
            "initialize" => Self::Initialize,
            "ping" => Self::Ping,
            "repos/list" => Self::ListRepos,
            "repos/resolve" => Self::ResolveRepo,
            "memory/read" => Self::ReadMemory,
            "memory/append" => Self::AppendMemory,
            "memory/capture" => Self::CaptureRaw,
            "state/write" => Self::WriteState,
            "status" => Self::Status,
            "watcher/start" => Self::StartWatcher,
            "watcher/stop" => Self::StopWatcher,
            "resources/list" => Self::ListResources,
            "resources/read" => Self::ReadResource,
            "tools/list" => Self::ListTools,
            "tools/call" => Self::CallTool,
            unknown => Self::Unknown(unknown.to_string()),
        }
    }
}

impl fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_as_str_roundtrip() {
        for method in RpcMethod::known_methods() {
            let parsed = RpcMethod::from(method.as_str());
            assert_eq!(&parsed, method, "Roundtrip failed for {method}");
            assert!(parsed.is_known());
        }
    }

    #[test]
    fn test_unknown_method() {
        let method = RpcMethod::from("prompts/list");
        assert!(!method.is_known());
        assert_eq!(method.to_string(), "prompts/list");
    }
}
