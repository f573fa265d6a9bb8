//! The configuration watcher: lifecycle, background thread, reload pipeline.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use crate::config::schema::AppConfig;
use crate::config::{diff, loader, validation};
use crate::error::WatchError;
use crate::watch::events::{ChangeEvent, EventLog};
use crate::watch::source::{self, EventSource, WaitOutcome};
use crate::watch::store::{Snapshot, SnapshotStore, DEFAULT_MAX_HISTORY};

type ChangeCallback = Arc<dyn Fn(&AppConfig, &AppConfig) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Watches a configuration file and hot-reloads it on change.
///
/// Construction performs a synchronous initial load (falling back to
/// defaults if the file is missing or invalid) and seeds the snapshot
/// history with version 0. [`start`](Self::start) then spawns one background
/// thread that blocks on the platform's file-change primitive and runs the
/// reload pipeline whenever the file changes. [`reload`](Self::reload) and
/// [`rollback`](Self::rollback) run the same pipeline synchronously on the
/// calling thread.
///
/// ```no_run
/// use hot_config::ConfigWatcher;
///
/// let watcher = ConfigWatcher::new("config.toml");
/// watcher.on_change(|_old, new| {
///     tracing::info!(level = %new.logger.level, "configuration updated");
/// });
/// watcher.start()?;
/// // ... application runs; watcher.current() is always safe to read ...
/// watcher.stop();
/// # Ok::<(), hot_config::WatchError>(())
/// ```
pub struct ConfigWatcher {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    path: PathBuf,
    store: SnapshotStore,
    events: EventLog,
    callbacks: Callbacks,
    running: AtomicBool,
    source: Mutex<Option<Arc<dyn EventSource>>>,
    /// Serializes commit + event-record as a unit so the event log carries
    /// versions in order. Never held while callbacks run.
    commit_guard: Mutex<()>,
}

#[derive(Default)]
struct Callbacks {
    on_change: Mutex<Vec<ChangeCallback>>,
    on_error: Mutex<Vec<ErrorCallback>>,
}

impl ConfigWatcher {
    /// Watch `path`, retaining [`DEFAULT_MAX_HISTORY`] snapshots.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_max_history(path, DEFAULT_MAX_HISTORY)
    }

    /// Watch `path`, retaining up to `max_history` snapshots for rollback.
    pub fn with_max_history(path: impl Into<PathBuf>, max_history: usize) -> Self {
        let path = path.into();
        let initial = loader::load(&path)
            .and_then(|config| validation::validate(&config).map(|()| config))
            .unwrap_or_else(|err| {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "initial configuration load failed, starting from defaults"
                );
                loader::defaults()
            });

        Self {
            shared: Arc::new(Shared {
                path,
                store: SnapshotStore::new(initial, max_history),
                events: EventLog::new(),
                callbacks: Callbacks::default(),
                running: AtomicBool::new(false),
                source: Mutex::new(None),
                commit_guard: Mutex::new(()),
            }),
            thread: Mutex::new(None),
        }
    }

    /// Start watching the file for changes.
    ///
    /// Fails with [`WatchError::AlreadyRunning`] if already started, or with
    /// the underlying watch-setup error, in which case the watcher stays
    /// stopped and `start` can be retried.
    pub fn start(&self) -> Result<(), WatchError> {
        let mut thread = self.lock_thread();
        if self.shared.running.load(Ordering::SeqCst) {
            return Err(WatchError::AlreadyRunning);
        }
        let source = source::platform_source(&self.shared.path)?;
        self.spawn_watch_thread(&mut thread, source)
    }

    /// Stop watching. Idempotent; also invoked on drop.
    ///
    /// Blocks until the background thread has joined.
    pub fn stop(&self) {
        let mut thread = self.lock_thread();
        let was_running = self.shared.running.swap(false, Ordering::SeqCst);

        if let Some(source) = self.lock_source().take() {
            source.cleanup();
        }
        if let Some(handle) = thread.take() {
            let _ = handle.join();
        }

        if was_running {
            tracing::info!(path = %self.shared.path.display(), "config watcher stopped");
        }
    }

    /// Whether `start` has been called without a matching `stop`.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Register a callback invoked with `(old, new)` after every successful
    /// commit, in registration order. Panics inside the callback are caught
    /// and discarded.
    pub fn on_change<F>(&self, callback: F)
    where
        F: Fn(&AppConfig, &AppConfig) + Send + Sync + 'static,
    {
        self.shared
            .callbacks
            .on_change
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    /// Register a callback invoked with the error message after every failed
    /// reload attempt.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.shared
            .callbacks
            .on_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    /// Manually trigger a reload, with the same semantics as an automatic
    /// one.
    pub fn reload(&self) -> Result<(), WatchError> {
        self.shared.reload()
    }

    /// The current configuration. Cheap, lock-free, and never partially
    /// updated.
    pub fn current(&self) -> Arc<AppConfig> {
        self.shared.store.current()
    }

    /// Current configuration version. The initial load is version 0; every
    /// successful reload or rollback increments it.
    pub fn version(&self) -> u64 {
        self.shared.store.version()
    }

    /// Retained snapshots, newest first. `count == 0` returns all of them.
    pub fn history(&self, count: usize) -> Vec<Snapshot> {
        self.shared.store.history(count)
    }

    /// Re-commit the configuration stored at `target_version` as a new
    /// version. Fails with [`WatchError::RollbackFailed`] if that version is
    /// no longer in history.
    pub fn rollback(&self, target_version: u64) -> Result<(), WatchError> {
        self.shared.rollback(target_version)
    }

    /// Path of the watched configuration file.
    pub fn config_path(&self) -> &Path {
        &self.shared.path
    }

    /// Recent change attempts, newest first. `count == 0` returns everything
    /// the log retains.
    pub fn recent_events(&self, count: usize) -> Vec<ChangeEvent> {
        self.shared.events.recent(count)
    }

    fn spawn_watch_thread(
        &self,
        thread: &mut MutexGuard<'_, Option<JoinHandle<()>>>,
        source: Arc<dyn EventSource>,
    ) -> Result<(), WatchError> {
        *self.lock_source() = Some(source.clone());
        self.shared.running.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let spawned = std::thread::Builder::new()
            .name("hot-config-watch".to_string())
            .spawn(move || shared.watch_loop(source.as_ref()));

        match spawned {
            Ok(handle) => {
                **thread = Some(handle);
                tracing::info!(path = %self.shared.path.display(), "config watcher started");
                Ok(())
            }
            Err(err) => {
                self.shared.running.store(false, Ordering::SeqCst);
                if let Some(source) = self.lock_source().take() {
                    source.cleanup();
                }
                Err(WatchError::WatchFailed(format!("failed to spawn watch thread: {err}")))
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn start_with_source(
        &self,
        source: Arc<dyn EventSource>,
    ) -> Result<(), WatchError> {
        let mut thread = self.lock_thread();
        if self.shared.running.load(Ordering::SeqCst) {
            return Err(WatchError::AlreadyRunning);
        }
        self.spawn_watch_thread(&mut thread, source)
    }

    fn lock_thread(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.thread.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_source(&self) -> MutexGuard<'_, Option<Arc<dyn EventSource>>> {
        self.shared.source.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    /// One full reload attempt: load → validate → diff → commit → record →
    /// notify. Load and validation failures leave the current configuration
    /// untouched.
    fn reload(&self) -> Result<(), WatchError> {
        let candidate = match loader::load(&self.path) {
            Ok(config) => config,
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(
                    path = %self.path.display(),
                    error = %message,
                    "configuration reload failed"
                );
                self.events.record(ChangeEvent::failure(self.store.version() + 1, message.clone()));
                self.callbacks.notify_error(&message);
                return Err(WatchError::ReloadFailed(message));
            }
        };

        if let Err(err) = validation::validate(&candidate) {
            let message = err.to_string();
            tracing::warn!(
                path = %self.path.display(),
                error = %message,
                "reloaded configuration failed validation, keeping current"
            );
            self.events.record(ChangeEvent::failure(self.store.version() + 1, message.clone()));
            self.callbacks.notify_error(&message);
            return Err(WatchError::ValidationFailed(message));
        }

        let commit = {
            let _guard = self.commit_guard.lock().unwrap_or_else(PoisonError::into_inner);
            let commit = self.store.commit(candidate);
            self.events.record(ChangeEvent::success(commit.version, commit.changed.clone()));
            commit
        };

        let restart_only: Vec<&String> = commit
            .changed
            .iter()
            .filter(|field| !diff::is_hot_reloadable(field))
            .collect();
        if !restart_only.is_empty() {
            tracing::warn!(
                fields = ?restart_only,
                "changed fields require a restart to take effect"
            );
        }

        tracing::info!(
            version = commit.version,
            changed = commit.changed.len(),
            "configuration reloaded"
        );
        self.callbacks.notify_change(&commit.old, &commit.new);

        Ok(())
    }

    /// Rollback runs the tail of the same pipeline: commit the remembered
    /// snapshot as a new version, record the event, notify subscribers.
    fn rollback(&self, target_version: u64) -> Result<(), WatchError> {
        let commit = {
            let _guard = self.commit_guard.lock().unwrap_or_else(PoisonError::into_inner);
            let commit = self.store.rollback(target_version)?;
            self.events.record(ChangeEvent::success(commit.version, commit.changed.clone()));
            commit
        };

        tracing::info!(
            version = commit.version,
            target = target_version,
            "configuration rolled back"
        );
        self.callbacks.notify_change(&commit.old, &commit.new);
        Ok(())
    }

    fn watch_loop(&self, source: &dyn EventSource) {
        tracing::debug!(path = %self.path.display(), "watch loop running");

        while self.running.load(Ordering::SeqCst) {
            match source.wait_for_event() {
                WaitOutcome::Timeout => continue,
                WaitOutcome::Changed => {
                    if !self.running.load(Ordering::SeqCst) {
                        break;
                    }
                    // Failures are already recorded and surfaced through the
                    // error callbacks; nothing crosses the thread boundary.
                    let _ = self.reload();
                }
                WaitOutcome::Error => {
                    if self.running.load(Ordering::SeqCst) {
                        tracing::error!(
                            path = %self.path.display(),
                            "event source failed, watching is inert until stop()"
                        );
                    }
                    break;
                }
            }
        }

        tracing::debug!(path = %self.path.display(), "watch loop exited");
    }
}

impl Callbacks {
    fn notify_change(&self, old: &AppConfig, new: &AppConfig) {
        let callbacks = self
            .on_change
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(old, new))).is_err() {
                tracing::warn!("change callback panicked, continuing");
            }
        }
    }

    fn notify_error(&self, message: &str) {
        let callbacks = self
            .on_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(message))).is_err() {
                tracing::warn!("error callback panicked, continuing");
            }
        }
    }
}
