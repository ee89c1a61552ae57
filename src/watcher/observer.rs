//! Recursive change observation over the configured watch roots.
//!
//! `notify` delivers events on its own thread; qualifying modifications are
//! handed to the single consumer through a bounded queue. When the queue is
//! full the notification is dropped rather than blocking the watcher.

use super::PathFilter;
use crate::config::PipelineSettings;
use crate::models::{ChangeNotification, ControlStatus};
use crate::{Error, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shared stop flag, observable by the producer and the consumer.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Triggers the signal and wakes all waiters.
    pub fn trigger(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    /// Returns true once the signal has been triggered.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleeps for up to `timeout`, returning early if the signal triggers.
    ///
    /// Returns true if the signal is triggered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// Single-consumer stream of change notifications.
///
/// Blocks with an idle timeout so that it ends within one poll interval of
/// the stop signal triggering, or as soon as the producer goes away.
#[derive(Debug)]
pub struct ChangeStream {
    receiver: Receiver<ChangeNotification>,
    stop: StopSignal,
    poll_interval: Duration,
}

impl ChangeStream {
    /// Wraps a receiver into a stream.
    #[must_use]
    pub const fn new(
        receiver: Receiver<ChangeNotification>,
        stop: StopSignal,
        poll_interval: Duration,
    ) -> Self {
        Self {
            receiver,
            stop,
            poll_interval,
        }
    }

    /// Creates a bounded queue and the stream draining it.
    #[must_use]
    pub fn bounded(capacity: usize, poll_interval: Duration) -> (SyncSender<ChangeNotification>, Self) {
        let (tx, rx) = mpsc::sync_channel(capacity);
        (tx, Self::new(rx, StopSignal::new(), poll_interval))
    }

    /// Returns the stop signal observed by this stream.
    #[must_use]
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }
}

impl Iterator for ChangeStream {
    type Item = ChangeNotification;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.stop.is_triggered() {
                return None;
            }
            match self.receiver.recv_timeout(self.poll_interval) {
                Ok(notification) => return Some(notification),
                Err(RecvTimeoutError::Timeout) => {},
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}

/// Result of [`ChangeObserver::start`].
#[derive(Debug)]
pub enum ObserverStart {
    /// Watches were registered; the stream yields notifications.
    Started(ChangeStream),
    /// The observer was already running; nothing changed.
    AlreadyRunning,
}

struct ActiveWatch {
    watcher: RecommendedWatcher,
    watched: Vec<PathBuf>,
    stop: StopSignal,
}

/// Watches directory trees and forwards qualifying file modifications.
pub struct ChangeObserver {
    roots: Vec<PathBuf>,
    filter: Arc<PathFilter>,
    poll_interval: Duration,
    queue_capacity: usize,
    active: Option<ActiveWatch>,
}

impl ChangeObserver {
    /// Creates an idle observer.
    #[must_use]
    pub fn new(roots: Vec<PathBuf>, filter: PathFilter, settings: &PipelineSettings) -> Self {
        Self {
            roots,
            filter: Arc::new(filter),
            poll_interval: settings.poll_interval(),
            queue_capacity: settings.queue_capacity.max(1),
            active: None,
        }
    }

    /// Returns true while watches are registered.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Registers a recursive watch on every existing root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if no root could be watched, or
    /// [`Error::OperationFailed`] if the platform watcher cannot be created.
    pub fn start(&mut self) -> Result<ObserverStart> {
        if self.active.is_some() {
            return Ok(ObserverStart::AlreadyRunning);
        }

        let (tx, rx) = mpsc::sync_channel(self.queue_capacity);
        let filter = Arc::clone(&self.filter);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => forward_event(&event, &filter, &tx),
            Err(e) => warn!(error = %e, "Watch error"),
        })
        .map_err(|e| Error::operation("create_watcher", e))?;

        let mut watched = Vec::with_capacity(self.roots.len());
        for root in &self.roots {
            if !root.is_dir() {
                warn!(root = %root.display(), "Watch root does not exist, skipping");
                continue;
            }
            match watcher.watch(root, RecursiveMode::Recursive) {
                Ok(()) => watched.push(root.clone()),
                Err(e) => warn!(root = %root.display(), error = %e, "Failed to watch root"),
            }
        }

        if watched.is_empty() {
            return Err(Error::InvalidInput(
                "no watch root could be registered".to_string(),
            ));
        }

        info!(roots = watched.len(), "Change observer started");
        let stop = StopSignal::new();
        let stream = ChangeStream::new(rx, stop.clone(), self.poll_interval);
        self.active = Some(ActiveWatch {
            watcher,
            watched,
            stop,
        });
        Ok(ObserverStart::Started(stream))
    }

    /// Releases all watches and ends the stream.
    pub fn stop(&mut self) -> ControlStatus {
        let Some(mut active) = self.active.take() else {
            return ControlStatus::NotRunning;
        };

        active.stop.trigger();
        for root in &active.watched {
            if let Err(e) = active.watcher.unwatch(root) {
                debug!(root = %root.display(), error = %e, "Failed to unwatch root");
            }
        }
        drop(active);
        info!("Change observer stopped");
        ControlStatus::Stopped
    }
}

impl Drop for ChangeObserver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Forwards the qualifying paths of a single `notify` event.
fn forward_event(event: &Event, filter: &PathFilter, tx: &SyncSender<ChangeNotification>) {
    if !matches!(event.kind, EventKind::Modify(_)) {
        return;
    }

    for path in &event.paths {
        if !qualifies(path, filter) {
            continue;
        }
        match tx.try_send(ChangeNotification::new(path.clone())) {
            Ok(()) => {
                metrics::counter!("agentlog_notifications_total").increment(1);
            },
            Err(TrySendError::Full(dropped)) => {
                metrics::counter!("agentlog_notifications_dropped_total").increment(1);
                warn!(path = %dropped.path.display(), "Change queue full, dropping notification");
            },
            Err(TrySendError::Disconnected(_)) => {
                debug!("Change stream closed, ignoring notification");
                return;
            },
        }
    }
}

fn qualifies(path: &Path, filter: &PathFilter) -> bool {
    !path.is_dir() && filter.accepts(path)
}
