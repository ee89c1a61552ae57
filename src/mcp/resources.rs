//! `memory://` resources.
//!
//! URIs have the form `memory://<repo_id>/<document>` where the document is
//! one of the log kinds (`attempts`, `failures`, `decisions`), `state` or
//! `signatures`.

use crate::models::{MemoryKind, MemorySnapshot, RepoId};
use crate::{Error, Result};
use serde::Serialize;

/// URI scheme prefix.
pub const SCHEME: &str = "memory://";

/// Document addressed by a resource URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceDocument {
    /// A journal log.
    Log(MemoryKind),
    /// The state document.
    State,
    /// The failure signature set.
    Signatures,
}

impl ResourceDocument {
    const fn name(self) -> &'static str {
        match self {
            Self::Log(kind) => kind.plural(),
            Self::State => "state",
            Self::Signatures => "signatures",
        }
    }

    const fn mime_type(self) -> &'static str {
        match self {
            Self::Log(_) => "text/markdown",
            Self::State | Self::Signatures => "application/json",
        }
    }
}

/// A listed resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDefinition {
    /// Resource URI.
    pub uri: String,
    /// Human-readable name.
    pub name: String,
    /// MIME type of the resource.
    pub mime_type: String,
}

/// Content of a read resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContent {
    /// Resource URI.
    pub uri: String,
    /// MIME type.
    pub mime_type: String,
    /// Text content.
    pub text: String,
}

/// Builds the URI of a repository document.
#[must_use]
pub fn resource_uri(repo: &RepoId, document: ResourceDocument) -> String {
    format!("{SCHEME}{repo}/{}", document.name())
}

/// Lists the log resources of each repository.
#[must_use]
pub fn list_resources<'a>(repos: impl IntoIterator<Item = &'a RepoId>) -> Vec<ResourceDefinition> {
    repos
        .into_iter()
        .flat_map(|repo| {
            MemoryKind::all().iter().map(move |&kind| {
                let document = ResourceDocument::Log(kind);
                ResourceDefinition {
                    uri: resource_uri(repo, document),
                    name: format!("{repo} {}", kind.plural()),
                    mime_type: document.mime_type().to_string(),
                }
            })
        })
        .collect()
}

/// Parses a `memory://` URI.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for any other scheme, an invalid
/// repository id or an unknown document.
pub fn parse_uri(uri: &str) -> Result<(RepoId, ResourceDocument)> {
    let rest = uri
        .strip_prefix(SCHEME)
        .ok_or_else(|| Error::InvalidInput(format!("unsupported resource URI: {uri}")))?;
    let (repo, document) = rest
        .split_once('/')
        .ok_or_else(|| Error::InvalidInput(format!("resource URI has no document: {uri}")))?;
    let repo = RepoId::parse(repo)?;
    let document = match document {
        "state" => ResourceDocument::State,
        "signatures" => ResourceDocument::Signatures,
        other => MemoryKind::parse(other)
            .map(ResourceDocument::Log)
            .ok_or_else(|| Error::InvalidInput(format!("unknown resource document: {other}")))?,
    };
    Ok((repo, document))
}

/// Renders a document of a snapshot as resource content.
///
/// # Errors
///
/// Returns an error if a JSON document cannot be serialized.
pub fn render(
    uri: &str,
    document: ResourceDocument,
    snapshot: &MemorySnapshot,
) -> Result<ResourceContent> {
    let text = match document {
        ResourceDocument::Log(kind) => snapshot.log(kind).to_string(),
        ResourceDocument::State => serde_json::to_string_pretty(&snapshot.state)
            .map_err(|e| Error::operation("render_resource", e))?,
        ResourceDocument::Signatures => serde_json::to_string_pretty(&snapshot.signatures)
            .map_err(|e| Error::operation("render_resource", e))?,
    };
    Ok(ResourceContent {
        uri: uri.to_string(),
        mime_type: document.mime_type().to_string(),
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uri() {
        let (repo, doc) = parse_uri("memory://abc123/failures").unwrap();
        assert_eq!(repo.as_str(), "abc123");
        assert_eq!(doc, ResourceDocument::Log(MemoryKind::Failure));
        assert_eq!(parse_uri("memory://abc/state").unwrap().1, ResourceDocument::State);
        assert_eq!(
            parse_uri("memory://abc/signatures").unwrap().1,
            ResourceDocument::Signatures
        );
    }

    #[test]
    fn test_parse_uri_rejects_bad_input() {
        for uri in [
            "file:///etc/passwd",
            "memory://abc",
            "memory://../x/failures",
            "memory://abc/nothing",
        ] {
            assert!(parse_uri(uri).is_err(), "{uri} should be rejected");
        }
    }

    #[test]
    fn test_list_resources() {
        let repo = RepoId::parse("r1").unwrap();
        let listed = list_resources([&repo]);
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[1].uri, "memory://r1/failures");
        assert_eq!(listed[1].mime_type, "text/markdown");
    }

    #[test]
    fn test_render_state() {
        let snapshot = MemorySnapshot {
            state: Some(serde_json::json!({"step": 3})),
            ..MemorySnapshot::default()
        };
        let content = render("memory://r1/state", ResourceDocument::State, &snapshot).unwrap();
        assert_eq!(content.mime_type, "application/json");
        assert!(content.text.contains("\"step\": 3"));
    }
}
