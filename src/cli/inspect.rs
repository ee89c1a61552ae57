//! Read-only commands.

use super::write_error;
use crate::config::AgentlogConfig;
use crate::models::{MemoryKind, RepoId};
use crate::services::MonitorService;
use crate::{Error, Result};
use std::io::Write;
use std::path::Path;

/// Prints the pipeline state and the latest activity score.
///
/// # Errors
///
/// Returns an error if output cannot be written.
pub fn cmd_status(service: &MonitorService, out: &mut impl Write) -> Result<()> {
    let running = if service.is_running() { "running" } else { "idle" };
    writeln!(out, "pipeline: {running}").map_err(write_error)?;
    match service.current_status() {
        Some(status) => writeln!(
            out,
            "activity score: {:.2} (at {})",
            status.score,
            status.timestamp.to_rfc3339()
        ),
        None => writeln!(out, "activity score: none recorded"),
    }
    .map_err(write_error)?;

    let repos = service.list_repos()?;
    writeln!(out, "repositories: {}", repos.len()).map_err(write_error)?;
    writeln!(out, "data root: {}", service.config().data_root.display()).map_err(write_error)
}

/// Lists known repositories as `<id>\t<root>`.
///
/// # Errors
///
/// Returns an error if the data root cannot be read.
pub fn cmd_repos(service: &MonitorService, out: &mut impl Write) -> Result<()> {
    let repos = service.list_repos()?;
    if repos.is_empty() {
        return writeln!(out, "no repositories recorded").map_err(write_error);
    }
    for (id, root) in repos {
        let root = root.map_or_else(|| "-".to_string(), |p| p.display().to_string());
        writeln!(out, "{id}\t{root}").map_err(write_error)?;
    }
    Ok(())
}

/// Prints every document stored for a repository.
///
/// # Errors
///
/// Returns an error if the id is invalid or the documents cannot be read.
pub fn cmd_show(service: &MonitorService, repo_id: &str, out: &mut impl Write) -> Result<()> {
    let repo = RepoId::parse(repo_id)?;
    let snapshot = service.read_memory(&repo)?;
    if snapshot.is_empty() {
        return writeln!(out, "nothing recorded for {repo}").map_err(write_error);
    }

    for &kind in MemoryKind::all() {
        let entries = snapshot.entries(kind);
        writeln!(out, "## {} ({})", kind.plural(), entries.len()).map_err(write_error)?;
        for entry in entries {
            writeln!(out, "[{}] {}", entry.timestamp, entry.text).map_err(write_error)?;
        }
        writeln!(out).map_err(write_error)?;
    }

    if !snapshot.signatures.is_empty() {
        writeln!(out, "## failure signatures").map_err(write_error)?;
        for signature in &snapshot.signatures {
            writeln!(out, "- {signature}").map_err(write_error)?;
        }
        writeln!(out).map_err(write_error)?;
    }

    if let Some(state) = &snapshot.state {
        let pretty = serde_json::to_string_pretty(state)
            .map_err(|e| Error::operation("render_state", e))?;
        writeln!(out, "## state\n{pretty}").map_err(write_error)?;
    }
    Ok(())
}

/// Prints the repository id enclosing `path`.
///
/// # Errors
///
/// Returns an error if output cannot be written.
pub fn cmd_resolve(service: &MonitorService, path: &Path, out: &mut impl Write) -> Result<()> {
    match service.resolve_repo(path) {
        Some(id) => writeln!(out, "{id}"),
        None => writeln!(out, "no repository encloses {}", path.display()),
    }
    .map_err(write_error)
}

/// Prints the effective configuration as TOML.
///
/// # Errors
///
/// Returns an error if the configuration cannot be serialized.
pub fn cmd_config(config: &AgentlogConfig, out: &mut impl Write) -> Result<()> {
    let rendered =
        toml::to_string_pretty(config).map_err(|e| Error::operation("render_config", e))?;
    write!(out, "{rendered}").map_err(write_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::FixedProbe;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> MonitorService {
        let config = AgentlogConfig::default().with_data_root(dir.path().join("data"));
        MonitorService::with_probe(config, Arc::new(FixedProbe(0.0))).unwrap()
    }

    fn output(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_status_without_activity() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let text = output(|out| cmd_status(&service, out));
        assert!(text.contains("pipeline: idle"));
        assert!(text.contains("activity score: none recorded"));
        assert!(text.contains("repositories: 0"));
    }

    #[test]
    fn test_show_lists_entries() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let repo = RepoId::parse("r1").unwrap();
        service
            .append_memory(&repo, MemoryKind::Failure, "tests failed", None)
            .unwrap();

        let text = output(|out| cmd_show(&service, "r1", out));
        assert!(text.contains("## failures (1)"));
        assert!(text.contains("tests failed"));
        assert!(text.contains("- tests failed"));

        let empty = output(|out| cmd_show(&service, "r2", out));
        assert!(empty.contains("nothing recorded for r2"));
    }

    #[test]
    fn test_show_rejects_bad_id() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let mut buf = Vec::new();
        assert!(cmd_show(&service, "../x", &mut buf).is_err());
    }

    #[test]
    fn test_repos_lists_unknown_paths() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        assert!(output(|out| cmd_repos(&service, out)).contains("no repositories"));

        let repo = RepoId::parse("r1").unwrap();
        service.append_memory(&repo, MemoryKind::Attempt, "x", None).unwrap();
        assert_eq!(output(|out| cmd_repos(&service, out)), "r1\t-\n");
    }

    #[test]
    fn test_config_renders_toml() {
        let config = AgentlogConfig::default()
            .with_data_root("/data")
            .with_watch_paths(["/code"]);
        let text = output(|out| cmd_config(&config, out));
        assert!(text.contains("data_root = \"/data\""));
        assert!(text.contains("[detection]"));
        let reparsed = AgentlogConfig::from_toml(&text).unwrap();
        assert_eq!(reparsed.watch_paths, config.watch_paths);
    }
}
