//! Manual memory entry.

use super::write_error;
use crate::models::{MemoryKind, RepoId};
use crate::services::MonitorService;
use crate::{Error, Result};
use std::io::Write;
use std::path::PathBuf;

/// Repository a manual entry is recorded under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordTarget {
    /// An explicit repository id.
    RepoId(String),
    /// A path inside the repository.
    Path(PathBuf),
}

/// Appends an entry of `kind` to the target repository.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for an unknown kind, an invalid id, or a
/// path outside any repository, and a store error if the append fails.
pub fn cmd_record(
    service: &MonitorService,
    kind: &str,
    text: &str,
    target: RecordTarget,
    out: &mut impl Write,
) -> Result<()> {
    let kind = MemoryKind::parse(kind).ok_or_else(|| {
        Error::InvalidInput(format!(
            "unknown memory kind '{kind}' (expected attempt, failure or decision)"
        ))
    })?;
    if text.trim().is_empty() {
        return Err(Error::InvalidInput("entry text cannot be empty".to_string()));
    }

    let repo = match target {
        RecordTarget::RepoId(id) => RepoId::parse(&id)?,
        RecordTarget::Path(path) => service.resolve_repo(&path).ok_or_else(|| {
            Error::InvalidInput(format!("no repository encloses {}", path.display()))
        })?,
    };

    service.append_memory(&repo, kind, text, None)?;
    writeln!(out, "recorded {kind} for {repo}").map_err(write_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentlogConfig;
    use crate::detector::FixedProbe;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> MonitorService {
        let config = AgentlogConfig::default().with_data_root(dir.path().join("data"));
        MonitorService::with_probe(config, Arc::new(FixedProbe(0.0))).unwrap()
    }

    #[test]
    fn test_record_by_path() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("project");
        std::fs::create_dir_all(project.join(".git")).unwrap();
        let service = service(&dir);

        let mut out = Vec::new();
        cmd_record(
            &service,
            "decisions",
            "adopt notify",
            RecordTarget::Path(project.clone()),
            &mut out,
        )
        .unwrap();

        let repo = service.resolve_repo(&project).unwrap();
        let snapshot = service.read_memory(&repo).unwrap();
        assert_eq!(snapshot.entries(MemoryKind::Decision)[0].text, "adopt notify");
        assert!(String::from_utf8(out).unwrap().starts_with("recorded decision for "));
    }

    #[test]
    fn test_record_rejects_bad_input() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let mut out = Vec::new();
        let target = || RecordTarget::RepoId("r1".to_string());

        assert!(cmd_record(&service, "musing", "x", target(), &mut out).is_err());
        assert!(cmd_record(&service, "attempt", "  ", target(), &mut out).is_err());
        assert!(
            cmd_record(&service, "attempt", "x", RecordTarget::RepoId("a/b".into()), &mut out)
                .is_err()
        );
    }
}
