//! Filesystem memory store.
//!
//! The store is the only component that touches paths under the data root.
//! Log documents are append-only: each entry is written with a single
//! `write_all` on a file opened in append mode. JSON documents are replaced
//! atomically through a temporary file and a rename.
//!
//! Writes are serialized per (repository, document) inside the process, so
//! the pipeline and the RPC adapter can share one store.

use super::layout::StoreLayout;
use crate::models::{
    ActivityStatus, MemoryEntry, MemoryKind, MemorySnapshot, RepoId, failure_signature,
};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Documents that have their own write lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Document {
    Log(MemoryKind),
    State,
    Signatures,
    Raw,
}

type LockKey = (RepoId, Document);

/// Distinguishes temporary files of concurrent writers within one process.
static TMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Append-only memory store keyed by repository identity.
#[derive(Debug)]
pub struct MemoryStore {
    layout: StoreLayout,
    canonical_root: PathBuf,
    locks: Mutex<HashMap<LockKey, Arc<Mutex<()>>>>,
    repos_lock: Mutex<()>,
    runtime_lock: Mutex<()>,
}

impl MemoryStore {
    /// Opens a store, creating the data root if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the data root cannot be created.
    pub fn open(data_root: impl Into<PathBuf>) -> Result<Self> {
        let layout = StoreLayout::new(data_root);
        fs::create_dir_all(layout.root()).map_err(|e| Error::OperationFailed {
            operation: "create_data_root".to_string(),
            cause: format!("{}: {e}", layout.root().display()),
        })?;
        let canonical_root =
            fs::canonicalize(layout.root()).unwrap_or_else(|_| layout.root().to_path_buf());

        Ok(Self {
            layout,
            canonical_root,
            locks: Mutex::new(HashMap::new()),
            repos_lock: Mutex::new(()),
            runtime_lock: Mutex::new(()),
        })
    }

    /// Returns the layout of the data root.
    #[must_use]
    pub const fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Returns the data root with symlinks resolved.
    #[must_use]
    pub fn canonical_root(&self) -> &Path {
        &self.canonical_root
    }

    /// Returns true if `path` lies under the data root.
    ///
    /// Files the store writes must never be fed back into the pipeline as
    /// capture sources.
    #[must_use]
    pub fn owns(&self, path: &Path) -> bool {
        if path.starts_with(self.layout.root()) || path.starts_with(&self.canonical_root) {
            return true;
        }
        path.parent()
            .and_then(|parent| fs::canonicalize(parent).ok())
            .is_some_and(|parent| parent.starts_with(&self.canonical_root))
    }

    /// Copies a source file into the repository's raw area.
    ///
    /// The copy keeps the source file name; a later capture of the same name
    /// replaces it.
    ///
    /// # Errors
    ///
    /// Returns an error if the source has no file name or cannot be copied.
    pub fn capture_raw(&self, repo: &RepoId, source: &Path) -> Result<PathBuf> {
        let name = source.file_name().ok_or_else(|| {
            Error::InvalidInput(format!("source has no file name: {}", source.display()))
        })?;
        let raw_dir = self.layout.raw_dir(repo);
        create_dir(&raw_dir)?;
        let dest = raw_dir.join(name);

        let lock = self.lock_for(repo, Document::Raw);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        fs::copy(source, &dest).map_err(|e| Error::OperationFailed {
            operation: "capture_raw".to_string(),
            cause: format!("{}: {e}", source.display()),
        })?;

        debug!(repo = %repo, dest = %dest.display(), "Captured raw file");
        Ok(dest)
    }

    /// Appends one entry to the repository's log for `kind`.
    ///
    /// Failure entries also record their signature if it is not yet present.
    /// `timestamp` defaults to the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the log or the signature set cannot be written.
    pub fn append_memory(
        &self,
        repo: &RepoId,
        kind: MemoryKind,
        text: &str,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let entry = MemoryEntry::new(text, timestamp).render();
        let memory_dir = self.layout.memory_dir(repo);
        create_dir(&memory_dir)?;

        {
            let lock = self.lock_for(repo, Document::Log(kind));
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            let path = self.layout.log_file(repo, kind);
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| Error::operation("open_memory_log", format!("{}: {e}", path.display())))?;
            file.write_all(entry.as_bytes())
                .map_err(|e| Error::operation("append_memory", e))?;
        }

        if kind == MemoryKind::Failure {
            if let Some(signature) = failure_signature(text) {
                self.add_signature(repo, signature)?;
            }
        }

        debug!(repo = %repo, kind = %kind, "Appended memory entry");
        Ok(())
    }

    fn add_signature(&self, repo: &RepoId, signature: String) -> Result<()> {
        let lock = self.lock_for(repo, Document::Signatures);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let path = self.layout.signatures_file(repo);
        let mut signatures: Vec<String> = read_json_or_default(&path)?;
        if signatures.contains(&signature) {
            return Ok(());
        }
        signatures.push(signature);
        write_json_atomic(&path, &signatures)
    }

    /// Reads everything stored for a repository.
    ///
    /// Unknown repositories yield an empty snapshot and nothing is created on
    /// disk. Malformed JSON documents are logged and read as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing document cannot be read.
    pub fn read_memory(&self, repo: &RepoId) -> Result<MemorySnapshot> {
        let mut snapshot = MemorySnapshot::default();
        for &kind in MemoryKind::all() {
            if let Some(text) = read_optional(&self.layout.log_file(repo, kind))? {
                *snapshot.log_mut(kind) = text;
            }
        }

        let state_path = self.layout.state_file(repo);
        snapshot.state = read_optional(&state_path)?.and_then(|raw| {
            serde_json::from_str(&raw)
                .map_err(|e| warn!(path = %state_path.display(), error = %e, "Malformed state document"))
                .ok()
        });
        snapshot.signatures = read_json_or_default(&self.layout.signatures_file(repo))?;
        Ok(snapshot)
    }

    /// Lists known repositories with their root paths.
    ///
    /// Repositories found on disk but missing from `repos.json` are listed
    /// with an unknown path.
    ///
    /// # Errors
    ///
    /// Returns an error if the data root cannot be read.
    pub fn list_repos(&self) -> Result<BTreeMap<RepoId, Option<PathBuf>>> {
        let mut repos: BTreeMap<RepoId, Option<PathBuf>> = self
            .read_repo_map()?
            .into_iter()
            .filter_map(|(id, root)| RepoId::parse(&id).ok().map(|id| (id, Some(PathBuf::from(root)))))
            .collect();

        let memory_root = self.layout.memory_root();
        let entries = match fs::read_dir(&memory_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(repos),
            Err(e) => return Err(Error::operation("list_repos", e)),
        };
        for entry in entries.flatten() {
            if !entry.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let name = entry.file_name();
            if let Some(Ok(id)) = name.to_str().map(RepoId::parse) {
                repos.entry(id).or_insert(None);
            }
        }
        Ok(repos)
    }

    /// Replaces the repository's state document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written.
    pub fn write_state(&self, repo: &RepoId, value: &serde_json::Value) -> Result<()> {
        create_dir(&self.layout.memory_dir(repo))?;
        let lock = self.lock_for(repo, Document::State);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        write_json_atomic(&self.layout.state_file(repo), value)
    }

    /// Records the root path of a repository in `repos.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the map cannot be written.
    pub fn record_repo_path(&self, repo: &RepoId, root: &Path) -> Result<()> {
        let _guard = self.repos_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read_repo_map()?;
        let root = root.to_string_lossy().into_owned();
        if map.get(repo.as_str()) == Some(&root) {
            return Ok(());
        }
        map.insert(repo.as_str().to_string(), root);
        write_json_atomic(&self.layout.repos_file(), &map)
    }

    /// Persists the latest activity status for other processes.
    ///
    /// # Errors
    ///
    /// Returns an error if the status file cannot be written.
    pub fn write_runtime_status(&self, status: &ActivityStatus) -> Result<()> {
        let path = self.layout.runtime_status_file();
        if let Some(parent) = path.parent() {
            create_dir(parent)?;
        }
        let _guard = self.runtime_lock.lock().unwrap_or_else(PoisonError::into_inner);
        write_json_atomic(&path, status)
    }

    /// Reads the persisted activity status, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the status file exists but cannot be read.
    pub fn read_runtime_status(&self) -> Result<Option<ActivityStatus>> {
        let path = self.layout.runtime_status_file();
        Ok(read_optional(&path)?.and_then(|raw| {
            serde_json::from_str(&raw)
                .map_err(|e| warn!(path = %path.display(), error = %e, "Malformed runtime status"))
                .ok()
        }))
    }

    fn read_repo_map(&self) -> Result<BTreeMap<String, String>> {
        read_json_or_default(&self.layout.repos_file())
    }

    fn lock_for(&self, repo: &RepoId, document: Document) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry((repo.clone(), document)).or_default())
    }
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| Error::OperationFailed {
        operation: "create_dir".to_string(),
        cause: format!("{}: {e}", path.display()),
    })
}

/// Reads a UTF-8 file, mapping a missing file to `None`.
fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::OperationFailed {
            operation: "read_document".to_string(),
            cause: format!("{}: {e}", path.display()),
        }),
    }
}

/// Reads a JSON document, falling back to the default when missing or malformed.
fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    let Some(raw) = read_optional(path)? else {
        return Ok(T::default());
    };
    Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "Malformed JSON document, using default");
        T::default()
    }))
}

/// Writes a JSON document through a temporary file and a rename.
fn write_json_atomic<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes =
        serde_json::to_vec_pretty(value).map_err(|e| Error::operation("serialize_document", e))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let sequence = TMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_file_name(format!(
        ".{file_name}.{}.{sequence}.tmp",
        std::process::id()
    ));

    fs::write(&tmp, &bytes).map_err(|e| Error::OperationFailed {
        operation: "write_document".to_string(),
        cause: format!("{}: {e}", tmp.display()),
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        Error::OperationFailed {
            operation: "replace_document".to_string(),
            cause: format!("{}: {e}", path.display()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, MemoryStore) {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::open(dir.path().join("data")).unwrap();
        (dir, store)
    }

    fn repo() -> RepoId {
        RepoId::parse("r1").unwrap()
    }

    #[test]
    fn test_open_creates_root() {
        let (dir, _store) = store();
        assert!(dir.path().join("data").is_dir());
    }

    #[test]
    fn test_append_memory_format() {
        let (_dir, store) = store();
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        store
            .append_memory(&repo(), MemoryKind::Decision, "use sqlite\n\n", Some(ts))
            .unwrap();

        let snapshot = store.read_memory(&repo()).unwrap();
        assert_eq!(snapshot.decisions, "### 2024-05-01T12:00:00Z\nuse sqlite\n\n");
        assert!(snapshot.attempts.is_empty());
        assert!(snapshot.signatures.is_empty());
    }

    #[test]
    fn test_failure_signatures_are_deduplicated() {
        let (_dir, store) = store();
        let r = repo();
        store.append_memory(&r, MemoryKind::Failure, "build failed\ndetails", None).unwrap();
        store.append_memory(&r, MemoryKind::Failure, "build failed\nother", None).unwrap();
        store.append_memory(&r, MemoryKind::Failure, "tests failed", None).unwrap();
        store.append_memory(&r, MemoryKind::Attempt, "not a failure", None).unwrap();

        let snapshot = store.read_memory(&r).unwrap();
        assert_eq!(snapshot.signatures, vec!["build failed", "tests failed"]);
        assert_eq!(snapshot.entries(MemoryKind::Failure).len(), 3);
    }

    #[test]
    fn test_signature_truncated_to_100_chars() {
        let (_dir, store) = store();
        let long = "x".repeat(150);
        store.append_memory(&repo(), MemoryKind::Failure, &long, None).unwrap();
        let snapshot = store.read_memory(&repo()).unwrap();
        assert_eq!(snapshot.signatures[0].chars().count(), 100);
    }

    #[test]
    fn test_read_unknown_repo_is_empty_and_creates_nothing() {
        let (_dir, store) = store();
        let unknown = RepoId::parse("nope").unwrap();
        let snapshot = store.read_memory(&unknown).unwrap();
        assert!(snapshot.is_empty());
        assert!(!store.layout().repo_dir(&unknown).exists());
    }

    #[test]
    fn test_malformed_json_reads_as_default() {
        let (_dir, store) = store();
        let r = repo();
        fs::create_dir_all(store.layout().memory_dir(&r)).unwrap();
        fs::write(store.layout().state_file(&r), "{not json").unwrap();
        fs::write(store.layout().signatures_file(&r), "[1, 2").unwrap();

        let snapshot = store.read_memory(&r).unwrap();
        assert!(snapshot.state.is_none());
        assert!(snapshot.signatures.is_empty());

        store.append_memory(&r, MemoryKind::Failure, "boom", None).unwrap();
        assert_eq!(store.read_memory(&r).unwrap().signatures, vec!["boom"]);
    }

    #[test]
    fn test_write_state_replaces_document() {
        let (_dir, store) = store();
        let r = repo();
        store.write_state(&r, &json!({"step": 1})).unwrap();
        store.write_state(&r, &json!({"step": 2, "done": true})).unwrap();

        let snapshot = store.read_memory(&r).unwrap();
        assert_eq!(snapshot.state, Some(json!({"step": 2, "done": true})));
        let leftovers: Vec<_> = fs::read_dir(store.layout().memory_dir(&r))
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_header_like_text_reads_back_as_one_entry() {
        let (_dir, store) = store();
        let r = repo();
        store
            .append_memory(&r, MemoryKind::Attempt, "ran tests\n\n### notes\nall green", None)
            .unwrap();
        store.append_memory(&r, MemoryKind::Attempt, "second", None).unwrap();

        let texts: Vec<String> = store
            .read_memory(&r)
            .unwrap()
            .entries(MemoryKind::Attempt)
            .into_iter()
            .map(|e| e.text)
            .collect();
        assert_eq!(texts, vec!["ran tests\n\n### notes\nall green", "second"]);
    }

    #[test]
    fn test_two_stores_replace_same_document_concurrently() {
        let dir = TempDir::new().unwrap();
        let stores: Vec<Arc<MemoryStore>> = (0..2)
            .map(|_| Arc::new(MemoryStore::open(dir.path()).unwrap()))
            .collect();
        let r = repo();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&stores[i % 2]);
                let r = r.clone();
                std::thread::spawn(move || {
                    for step in 0..25 {
                        store.write_state(&r, &json!({ "writer": i, "step": step })).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let state = stores[0].read_memory(&r).unwrap().state.unwrap();
        assert_eq!(state["step"], json!(24));
        let leftovers = fs::read_dir(stores[0].layout().memory_dir(&r))
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_owns_paths_under_data_root() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::open(dir.path().join("proj").join("agentlog_data")).unwrap();
        let r = repo();
        store.append_memory(&r, MemoryKind::Attempt, "x", None).unwrap();

        assert!(store.owns(&store.layout().log_file(&r, MemoryKind::Attempt)));
        assert!(store.owns(&store.canonical_root().join("raw-logs").join("a.log")));
        assert!(!store.owns(&dir.path().join("proj").join("app.log")));
        assert!(!store.owns(&dir.path().join("proj").join("agentlog_data2").join("x.md")));
    }

    #[test]
    fn test_capture_raw_latest_wins() {
        let (dir, store) = store();
        let source = dir.path().join("app.log");
        fs::write(&source, "first").unwrap();
        let dest = store.capture_raw(&repo(), &source).unwrap();
        assert_eq!(dest, store.layout().raw_dir(&repo()).join("app.log"));

        fs::write(&source, "second").unwrap();
        store.capture_raw(&repo(), &source).unwrap();
        assert_eq!(fs::read_to_string(dest).unwrap(), "second");
    }

    #[test]
    fn test_capture_raw_missing_source_fails() {
        let (dir, store) = store();
        let result = store.capture_raw(&repo(), &dir.path().join("gone.log"));
        assert!(matches!(result, Err(Error::OperationFailed { .. })));
    }

    #[test]
    fn test_list_repos_merges_map_and_disk() {
        let (_dir, store) = store();
        let mapped = RepoId::parse("mapped").unwrap();
        store.record_repo_path(&mapped, Path::new("/srv/mapped")).unwrap();
        store.append_memory(&repo(), MemoryKind::Attempt, "x", None).unwrap();
        fs::create_dir_all(store.layout().memory_root().join("bad name")).unwrap();

        let repos = store.list_repos().unwrap();
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[&mapped], Some(PathBuf::from("/srv/mapped")));
        assert_eq!(repos[&repo()], None);
    }

    #[test]
    fn test_record_repo_path_updates_map() {
        let (_dir, store) = store();
        let r = repo();
        store.record_repo_path(&r, Path::new("/a")).unwrap();
        store.record_repo_path(&r, Path::new("/a")).unwrap();
        store.record_repo_path(&r, Path::new("/b")).unwrap();
        assert_eq!(store.list_repos().unwrap()[&r], Some(PathBuf::from("/b")));
    }

    #[test]
    fn test_runtime_status_roundtrip() {
        let (_dir, store) = store();
        assert!(store.read_runtime_status().unwrap().is_none());
        let status = ActivityStatus::now(0.79);
        store.write_runtime_status(&status).unwrap();
        assert_eq!(store.read_runtime_status().unwrap(), Some(status));
    }

    #[test]
    fn test_concurrent_appends_keep_entries_whole() {
        let (_dir, store) = store();
        let store = Arc::new(store);
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        store
                            .append_memory(&repo(), MemoryKind::Attempt, &format!("t{t} e{i}\nbody"), None)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let entries = store.read_memory(&repo()).unwrap().entries(MemoryKind::Attempt);
        assert_eq!(entries.len(), 200);
        assert!(entries.iter().all(|e| e.text.ends_with("\nbody")));
    }
}
