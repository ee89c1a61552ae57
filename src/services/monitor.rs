//! Monitor service: the explicit context object owning every component.
//!
//! Front ends (CLI, JSON-RPC adapter) hold one `MonitorService` and call into
//! it; there is no process-global domain state.

use super::{Coordinator, RuntimeState};
use crate::config::AgentlogConfig;
use crate::detector::{ProcessProbe, SystemProcessProbe};
use crate::models::{ActivityStatus, ControlStatus, MemoryKind, MemorySnapshot, RepoId};
use crate::repo::RepoResolver;
use crate::storage::MemoryStore;
use crate::watcher::{ChangeObserver, ObserverStart, PathFilter};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use tracing::{info, warn};

struct Worker {
    observer: ChangeObserver,
    handle: JoinHandle<()>,
}

/// Owns the store, resolver, probe and the background pipeline.
pub struct MonitorService {
    config: AgentlogConfig,
    store: Arc<MemoryStore>,
    resolver: RepoResolver,
    probe: Arc<dyn ProcessProbe>,
    runtime: Arc<RuntimeState>,
    worker: Mutex<Option<Worker>>,
}

impl MonitorService {
    /// Creates a service probing the live process table.
    ///
    /// # Errors
    ///
    /// Returns an error if the data root cannot be created.
    pub fn new(config: AgentlogConfig) -> Result<Self> {
        let probe = SystemProcessProbe::new(
            &config.detection.process_indicators,
            config.detection.process_confidence,
        );
        Self::with_probe(config, Arc::new(probe))
    }

    /// Creates a service with an explicit process probe.
    ///
    /// # Errors
    ///
    /// Returns an error if the data root cannot be created.
    pub fn with_probe(config: AgentlogConfig, probe: Arc<dyn ProcessProbe>) -> Result<Self> {
        let store = Arc::new(MemoryStore::open(&config.data_root)?);
        Ok(Self {
            resolver: RepoResolver::new(Arc::clone(&store)),
            store,
            probe,
            runtime: Arc::new(RuntimeState::new()),
            worker: Mutex::new(None),
            config,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &AgentlogConfig {
        &self.config
    }

    /// Returns the shared store.
    #[must_use]
    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.store)
    }

    /// Starts the observer and the pipeline thread.
    ///
    /// # Errors
    ///
    /// Returns an error if no watch root can be registered or the pipeline
    /// thread cannot be spawned.
    pub fn start(&self) -> Result<ControlStatus> {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            return Ok(ControlStatus::AlreadyRunning);
        }
        if let Some(finished) = worker.take() {
            warn!("Pipeline thread exited unexpectedly, restarting");
            shutdown(finished);
        }

        let filter = PathFilter::new(&self.config.extensions, &self.config.ignore_patterns)
            .exclude_dir(self.store.layout().root())
            .exclude_dir(self.store.canonical_root());
        let mut observer =
            ChangeObserver::new(self.config.watch_paths.clone(), filter, &self.config.pipeline);
        let ObserverStart::Started(stream) = observer.start()? else {
            return Ok(ControlStatus::AlreadyRunning);
        };

        let mut coordinator = Coordinator::new(
            &self.config,
            Arc::clone(&self.store),
            Arc::clone(&self.probe),
            Arc::clone(&self.runtime),
        );
        let handle = std::thread::Builder::new()
            .name("agentlog-pipeline".to_string())
            .spawn(move || coordinator.run(stream))
            .map_err(|e| Error::operation("spawn_pipeline", e))?;

        *worker = Some(Worker { observer, handle });
        info!(roots = self.config.watch_paths.len(), "Monitoring started");
        Ok(ControlStatus::Started)
    }

    /// Stops the observer and joins the pipeline thread.
    pub fn stop(&self) -> ControlStatus {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(worker) = worker else {
            return ControlStatus::NotRunning;
        };
        shutdown(worker);
        info!("Monitoring stopped");
        ControlStatus::Stopped
    }

    /// Returns true while the pipeline thread is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Resolves the repository enclosing `path`.
    #[must_use]
    pub fn resolve_repo(&self, path: &Path) -> Option<RepoId> {
        self.resolver.resolve(path)
    }

    /// Copies a file into a repository's raw area.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails.
    pub fn capture_raw(&self, repo: &RepoId, source: &Path) -> Result<PathBuf> {
        self.store.capture_raw(repo, source)
    }

    /// Appends a memory entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be written.
    pub fn append_memory(
        &self,
        repo: &RepoId,
        kind: MemoryKind,
        text: &str,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.store.append_memory(repo, kind, text, timestamp)
    }

    /// Reads everything stored for a repository.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing document cannot be read.
    pub fn read_memory(&self, repo: &RepoId) -> Result<MemorySnapshot> {
        self.store.read_memory(repo)
    }

    /// Lists known repositories.
    ///
    /// # Errors
    ///
    /// Returns an error if the data root cannot be read.
    pub fn list_repos(&self) -> Result<BTreeMap<RepoId, Option<PathBuf>>> {
        self.store.list_repos()
    }

    /// Replaces a repository's state document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written.
    pub fn write_state(&self, repo: &RepoId, value: &serde_json::Value) -> Result<()> {
        self.store.write_state(repo, value)
    }

    /// Returns the latest activity status.
    ///
    /// Falls back to the status persisted by another process when this one
    /// has not scored anything yet.
    #[must_use]
    pub fn current_status(&self) -> Option<ActivityStatus> {
        self.runtime.current().or_else(|| {
            self.store.read_runtime_status().unwrap_or_else(|e| {
                warn!(error = %e, "Failed to read runtime status");
                None
            })
        })
    }
}

impl Drop for MonitorService {
    fn drop(&mut self) {
        self.stop();
    }
}

fn shutdown(mut worker: Worker) {
    worker.observer.stop();
    if worker.handle.join().is_err() {
        warn!("Pipeline thread panicked");
    }
}
