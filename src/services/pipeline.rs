//! Pipeline coordinator: score, resolve, capture.
//!
//! Every notification is scored. When the score reaches the activation
//! threshold the enclosing repository is resolved, the changed file is
//! copied into the repository's raw area, and a structured entry is
//! appended: a failure if the captured text contains a failure indicator,
//! an attempt otherwise.

use crate::config::AgentlogConfig;
use crate::detector::{ActivityScorer, ProcessProbe};
use crate::models::{ActivityStatus, ChangeNotification, MemoryKind, RepoId};
use crate::repo::{RepoResolver, current_branch};
use crate::services::RuntimeState;
use crate::storage::MemoryStore;
use crate::watcher::ChangeStream;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn};

/// Maximum length (in characters) of the matching line quoted in a failure entry.
pub const MATCH_LINE_MAX_CHARS: usize = 200;

/// Processing phase of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the next notification.
    Idle,
    /// Computing the activity score.
    Scoring,
    /// Resolving, copying and recording.
    Capturing,
}

/// Result of handling one notification.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// The path lies under the data root; it was neither scored nor captured.
    StoreOwned,
    /// The score stayed under the activation threshold.
    BelowThreshold {
        /// Computed score.
        score: f64,
    },
    /// The path is not inside a repository.
    NoRepository {
        /// Computed score.
        score: f64,
    },
    /// The file was captured and an entry appended.
    Captured {
        /// Repository the entry was recorded under.
        repo: RepoId,
        /// Kind of the appended entry.
        kind: MemoryKind,
        /// Location of the raw copy.
        raw_path: PathBuf,
        /// Computed score.
        score: f64,
    },
    /// Capturing failed; the pipeline keeps running.
    Failed {
        /// Stage that failed.
        stage: &'static str,
        /// Error description.
        error: String,
    },
}

/// Drives notifications through the scorer, resolver and store.
pub struct Coordinator {
    scorer: ActivityScorer,
    probe: Arc<dyn ProcessProbe>,
    resolver: RepoResolver,
    store: Arc<MemoryStore>,
    runtime: Arc<RuntimeState>,
    threshold: f64,
    failure_indicators: Vec<String>,
    capture_delay: Duration,
    phase: Phase,
}

impl Coordinator {
    /// Creates a coordinator from the configuration and shared components.
    #[must_use]
    pub fn new(
        config: &AgentlogConfig,
        store: Arc<MemoryStore>,
        probe: Arc<dyn ProcessProbe>,
        runtime: Arc<RuntimeState>,
    ) -> Self {
        let detection = &config.detection;
        Self {
            scorer: ActivityScorer::new(detection.churn_window(), detection.min_fs_events),
            probe,
            resolver: RepoResolver::new(Arc::clone(&store)),
            store,
            runtime,
            threshold: detection.activation_threshold,
            failure_indicators: detection
                .failure_indicators
                .iter()
                .map(|i| i.to_lowercase())
                .filter(|i| !i.is_empty())
                .collect(),
            capture_delay: config.pipeline.capture_delay(),
            phase: Phase::Idle,
        }
    }

    /// Returns the current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Handles one notification.
    pub fn handle(&mut self, notification: &ChangeNotification) -> PipelineOutcome {
        let span = info_span!("agentlog.pipeline", path = %notification.path.display());
        let _enter = span.enter();

        if self.store.owns(&notification.path) {
            debug!("Ignoring change under the data root");
            return PipelineOutcome::StoreOwned;
        }

        self.phase = Phase::Scoring;
        self.scorer.record_event(notification.detected_at);
        let score = self.scorer.score(self.probe.confidence());
        self.publish_score(score);

        if score < self.threshold {
            self.phase = Phase::Idle;
            debug!(score, threshold = self.threshold, "Below activation threshold");
            return PipelineOutcome::BelowThreshold { score };
        }

        let Some((repo, root)) = self.resolver.resolve_with_root(&notification.path) else {
            self.phase = Phase::Idle;
            debug!(score, "No enclosing repository");
            return PipelineOutcome::NoRepository { score };
        };

        self.phase = Phase::Capturing;
        let result = self.capture(&repo, &root, notification);
        self.phase = Phase::Idle;

        match result {
            Ok((kind, raw_path)) => {
                metrics::counter!("agentlog_captures_total", "kind" => kind.as_str()).increment(1);
                info!(repo = %repo, kind = %kind, score, "Captured activity");
                PipelineOutcome::Captured {
                    repo,
                    kind,
                    raw_path,
                    score,
                }
            },
            Err((stage, e)) => {
                metrics::counter!("agentlog_pipeline_errors_total", "stage" => stage).increment(1);
                warn!(repo = %repo, stage, error = %e, "Capture failed");
                PipelineOutcome::Failed {
                    stage,
                    error: e.to_string(),
                }
            },
        }
    }

    /// Drains the stream until it ends.
    ///
    /// After each successful capture the coordinator pauses for the
    /// configured capture delay; the pause ends early when the stream's stop
    /// signal triggers.
    pub fn run(&mut self, stream: ChangeStream) {
        let stop = stream.stop_signal();
        info!("Pipeline coordinator running");
        for notification in stream {
            let outcome = self.handle(&notification);
            if matches!(outcome, PipelineOutcome::Captured { .. })
                && !self.capture_delay.is_zero()
                && stop.wait_timeout(self.capture_delay)
            {
                break;
            }
        }
        info!("Pipeline coordinator stopped");
    }

    fn publish_score(&self, score: f64) {
        let status = ActivityStatus::now(score);
        self.runtime.update(status);
        metrics::gauge!("agentlog_activity_score").set(score);
        if let Err(e) = self.store.write_runtime_status(&status) {
            metrics::counter!("agentlog_pipeline_errors_total", "stage" => "runtime_status")
                .increment(1);
            debug!(error = %e, "Failed to persist runtime status");
        }
    }

    fn capture(
        &self,
        repo: &RepoId,
        root: &Path,
        notification: &ChangeNotification,
    ) -> std::result::Result<(MemoryKind, PathBuf), (&'static str, Error)> {
        let raw_path = self
            .store
            .capture_raw(repo, &notification.path)
            .map_err(|e| ("capture", e))?;
        let contents = read_lossy(&raw_path).map_err(|e| ("classify", e))?;
        let matched = first_matching_line(&contents, &self.failure_indicators);
        let kind = if matched.is_some() {
            MemoryKind::Failure
        } else {
            MemoryKind::Attempt
        };

        let body = entry_body(
            &notification.path,
            current_branch(root).as_deref(),
            matched,
        );
        self.store
            .append_memory(repo, kind, &body, Some(notification.observed_at))
            .map_err(|e| ("append", e))?;
        Ok((kind, raw_path))
    }
}

fn read_lossy(path: &Path) -> Result<String> {
    std::fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .map_err(|e| Error::operation("read_capture", e))
}

/// Returns the first line containing any lowercase indicator, case-insensitively.
#[must_use]
pub fn first_matching_line<'a>(text: &'a str, indicators: &[String]) -> Option<&'a str> {
    if indicators.is_empty() {
        return None;
    }
    text.lines().find(|line| {
        let lower = line.to_lowercase();
        indicators.iter().any(|i| lower.contains(i.as_str()))
    })
}

/// Builds the body of a captured entry.
///
/// The first line doubles as the failure signature.
#[must_use]
pub fn entry_body(source: &Path, branch: Option<&str>, matched: Option<&str>) -> String {
    let name = source
        .file_name()
        .map_or_else(|| source.to_string_lossy(), |n| n.to_string_lossy());
    let mut body = if matched.is_some() {
        format!("error detected in {name}\n")
    } else {
        format!("activity detected in {name}\n")
    };
    body.push_str(&format!("source: {}\n", source.display()));
    if let Some(branch) = branch {
        body.push_str(&format!("branch: {branch}\n"));
    }
    if let Some(line) = matched {
        let line: String = line.trim().chars().take(MATCH_LINE_MAX_CHARS).collect();
        body.push_str(&format!("match: {line}\n"));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::FixedProbe;
    use std::fs;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: Arc<MemoryStore>,
        runtime: Arc<RuntimeState>,
        repo_root: PathBuf,
        config: AgentlogConfig,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let repo_root = dir.path().join("project");
        fs::create_dir_all(repo_root.join(".git")).unwrap();
        let repo_root = fs::canonicalize(repo_root).unwrap();
        let config = AgentlogConfig::default()
            .with_data_root(dir.path().join("data"))
            .with_watch_paths([repo_root.clone()]);
        let store = Arc::new(MemoryStore::open(&config.data_root).unwrap());
        Fixture {
            _dir: dir,
            store,
            runtime: Arc::new(RuntimeState::new()),
            repo_root,
            config,
        }
    }

    fn coordinator(f: &Fixture, p: f64) -> Coordinator {
        Coordinator::new(
            &f.config,
            Arc::clone(&f.store),
            Arc::new(FixedProbe(p)),
            Arc::clone(&f.runtime),
        )
    }

    fn burst(path: &Path, n: u64) -> Vec<ChangeNotification> {
        let base = Instant::now();
        (0..n)
            .map(|i| ChangeNotification::at(path, base + Duration::from_secs(i * 2)))
            .collect()
    }

    #[test]
    fn test_churn_alone_stays_below_threshold() {
        let f = fixture();
        let file = f.repo_root.join("app.log");
        fs::write(&file, "compiling").unwrap();
        let mut c = coordinator(&f, 0.0);

        let outcomes: Vec<_> = burst(&file, 5).iter().map(|n| c.handle(n)).collect();
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, PipelineOutcome::BelowThreshold { .. })));
        let last = f.runtime.current().unwrap();
        assert!((last.score - 0.3).abs() < 1e-9);
        assert!(f.store.list_repos().unwrap().is_empty());
    }

    #[test]
    fn test_process_and_churn_capture_once() {
        let f = fixture();
        let file = f.repo_root.join("app.log");
        fs::write(&file, "all good\n").unwrap();
        let mut c = coordinator(&f, 0.7);

        let notifications = burst(&file, 5);
        for n in &notifications[..4] {
            // 0.7 * 0.7 = 0.49 stays under the 0.5 threshold.
            assert!(matches!(c.handle(n), PipelineOutcome::BelowThreshold { .. }));
        }
        let PipelineOutcome::Captured {
            repo,
            kind,
            raw_path,
            score,
        } = c.handle(&notifications[4])
        else {
            panic!("fifth notification should capture");
        };
        assert!((score - 0.79).abs() < 1e-9);
        assert_eq!(kind, MemoryKind::Attempt);
        assert_eq!(repo, RepoId::from_root(&f.repo_root));
        assert_eq!(fs::read_to_string(raw_path).unwrap(), "all good\n");

        let snapshot = f.store.read_memory(&repo).unwrap();
        let entries = snapshot.entries(MemoryKind::Attempt);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].text.starts_with("activity detected in app.log\n"));
        assert!(snapshot.failures.is_empty());
        assert_eq!(c.phase(), Phase::Idle);
    }

    #[test]
    fn test_error_text_is_recorded_as_failure() {
        let f = fixture();
        let file = f.repo_root.join("build.log");
        fs::write(&file, "step 1 ok\nBuild ERROR: missing symbol\nlink failed\n").unwrap();
        let mut c = coordinator(&f, 1.0);

        let PipelineOutcome::Captured { repo, kind, .. } = c.handle(&ChangeNotification::new(&file))
        else {
            panic!("expected capture");
        };
        assert_eq!(kind, MemoryKind::Failure);
        let snapshot = f.store.read_memory(&repo).unwrap();
        assert_eq!(snapshot.signatures, vec!["error detected in build.log"]);
        let entry = &snapshot.entries(MemoryKind::Failure)[0];
        assert!(entry.text.contains("match: Build ERROR: missing symbol"));
    }

    #[test]
    fn test_outside_repository() {
        let f = fixture();
        let loose = f.repo_root.parent().unwrap().join("loose.log");
        fs::write(&loose, "x").unwrap();
        let mut c = coordinator(&f, 1.0);

        // The temp dir is normally outside any repository.
        if crate::repo::find_repo_root(&loose).is_none() {
            assert!(matches!(
                c.handle(&ChangeNotification::new(&loose)),
                PipelineOutcome::NoRepository { .. }
            ));
        }
    }

    #[test]
    fn test_data_root_changes_are_not_scored() {
        let dir = TempDir::new().unwrap();
        let repo_root = dir.path().join("proj");
        fs::create_dir_all(repo_root.join(".git")).unwrap();
        let config = AgentlogConfig::default()
            .with_data_root(repo_root.join("agentlog_data"))
            .with_watch_paths([repo_root.clone()]);
        let store = Arc::new(MemoryStore::open(&config.data_root).unwrap());
        let runtime = Arc::new(RuntimeState::new());
        let mut c = Coordinator::new(
            &config,
            Arc::clone(&store),
            Arc::new(FixedProbe(1.0)),
            Arc::clone(&runtime),
        );

        let source = repo_root.join("app.log");
        fs::write(&source, "working\n").unwrap();
        let PipelineOutcome::Captured { repo, raw_path, .. } =
            c.handle(&ChangeNotification::new(&source))
        else {
            panic!("expected capture");
        };

        let journal = store.layout().log_file(&repo, MemoryKind::Attempt);
        for own in [&raw_path, &journal] {
            assert_eq!(
                c.handle(&ChangeNotification::new(own)),
                PipelineOutcome::StoreOwned
            );
        }
        assert_eq!(c.scorer.window_len(), 1);
        assert_eq!(store.read_memory(&repo).unwrap().entries(MemoryKind::Attempt).len(), 1);
    }

    #[test]
    fn test_vanished_file_fails_without_entry() {
        let f = fixture();
        let file = f.repo_root.join("gone.log");
        let mut c = coordinator(&f, 1.0);

        let outcome = c.handle(&ChangeNotification::new(&file));
        assert!(matches!(outcome, PipelineOutcome::Failed { stage: "capture", .. }));
        let snapshot = f
            .store
            .read_memory(&RepoId::from_root(&f.repo_root))
            .unwrap();
        assert!(snapshot.attempts.is_empty());
    }

    #[test]
    fn test_run_drains_stream_until_producer_drops() {
        let mut f = fixture();
        f.config.pipeline.capture_delay_seconds = 0.0;
        let file = f.repo_root.join("notes.md");
        fs::write(&file, "progress").unwrap();
        let mut c = coordinator(&f, 1.0);

        let (tx, stream) = ChangeStream::bounded(8, Duration::from_millis(10));
        tx.send(ChangeNotification::new(&file)).unwrap();
        tx.send(ChangeNotification::new(&file)).unwrap();
        drop(tx);
        c.run(stream);

        let snapshot = f
            .store
            .read_memory(&RepoId::from_root(&f.repo_root))
            .unwrap();
        assert_eq!(snapshot.entries(MemoryKind::Attempt).len(), 2);
    }

    #[test]
    fn test_first_matching_line_is_case_insensitive() {
        let indicators = vec!["error".to_string(), "failed".to_string()];
        assert_eq!(
            first_matching_line("ok\nFatal ERROR here\nfailed", &indicators),
            Some("Fatal ERROR here")
        );
        assert_eq!(first_matching_line("all fine", &indicators), None);
        assert_eq!(first_matching_line("error", &[]), None);
    }

    #[test]
    fn test_entry_body_layout() {
        let body = entry_body(Path::new("/r/app.log"), Some("main"), None);
        assert_eq!(body, "activity detected in app.log\nsource: /r/app.log\nbranch: main\n");

        let long = "e".repeat(300);
        let body = entry_body(Path::new("/r/app.log"), None, Some(&long));
        let match_line = body.lines().last().unwrap();
        assert_eq!(match_line.chars().count(), "match: ".len() + MATCH_LINE_MAX_CHARS);
    }
}
