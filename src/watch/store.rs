//! Snapshot store: current configuration, version counter, bounded history.
//!
//! # Design Decisions
//! - The current config lives behind an `ArcSwap`: readers are lock-free and
//!   can never observe a half-written configuration
//! - Commits (reload and rollback alike) serialize on the history lock, which
//!   is held across diff + swap + version increment + history append so the
//!   version sequence and history order always agree
//! - Rollback is itself a commit: it allocates a fresh version and appends to
//!   history rather than rewinding the counter

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use arc_swap::ArcSwap;

use crate::config::diff;
use crate::config::schema::AppConfig;
use crate::error::WatchError;

/// Default number of snapshots retained for rollback.
pub const DEFAULT_MAX_HISTORY: usize = 10;

/// An immutable, versioned configuration retained for rollback.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Version assigned when this configuration was committed.
    pub version: u64,

    /// When the commit happened.
    pub timestamp: SystemTime,

    /// The committed configuration.
    pub config: Arc<AppConfig>,
}

/// Everything a commit produced, for event recording and notification.
#[derive(Debug)]
pub(crate) struct Commit {
    pub old: Arc<AppConfig>,
    pub new: Arc<AppConfig>,
    pub version: u64,
    pub changed: Vec<String>,
}

pub(crate) struct SnapshotStore {
    current: ArcSwap<AppConfig>,
    version: AtomicU64,
    max_history: usize,
    history: Mutex<VecDeque<Snapshot>>,
}

impl SnapshotStore {
    /// Seed the store with the initial configuration as version 0.
    pub(crate) fn new(initial: AppConfig, max_history: usize) -> Self {
        let initial = Arc::new(initial);
        let mut history = VecDeque::new();
        history.push_back(Snapshot {
            version: 0,
            timestamp: SystemTime::now(),
            config: initial.clone(),
        });
        Self {
            current: ArcSwap::new(initial),
            version: AtomicU64::new(0),
            max_history: max_history.max(1),
            history: Mutex::new(history),
        }
    }

    pub(crate) fn current(&self) -> Arc<AppConfig> {
        self.current.load_full()
    }

    pub(crate) fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Replace the current configuration with `candidate` as a new version.
    pub(crate) fn commit(&self, candidate: AppConfig) -> Commit {
        let mut history = self.lock_history();
        self.commit_locked(&mut history, Arc::new(candidate))
    }

    /// Re-commit the configuration stored at `target_version`.
    pub(crate) fn rollback(&self, target_version: u64) -> Result<Commit, WatchError> {
        let mut history = self.lock_history();
        let config = history
            .iter()
            .find(|snapshot| snapshot.version == target_version)
            .map(|snapshot| snapshot.config.clone())
            .ok_or(WatchError::RollbackFailed(target_version))?;
        Ok(self.commit_locked(&mut history, config))
    }

    /// Snapshots newest first; `count == 0` returns everything retained.
    pub(crate) fn history(&self, count: usize) -> Vec<Snapshot> {
        let history = self.lock_history();
        let iter = history.iter().rev().cloned();
        if count == 0 {
            iter.collect()
        } else {
            iter.take(count).collect()
        }
    }

    fn commit_locked(
        &self,
        history: &mut MutexGuard<'_, VecDeque<Snapshot>>,
        new: Arc<AppConfig>,
    ) -> Commit {
        let old = self.current.load_full();
        let changed = diff::changed_fields(&old, &new);

        self.current.store(new.clone());
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;

        history.push_back(Snapshot {
            version,
            timestamp: SystemTime::now(),
            config: new.clone(),
        });
        while history.len() > self.max_history {
            history.pop_front();
        }

        Commit { old, new, version, changed }
    }

    fn lock_history(&self) -> MutexGuard<'_, VecDeque<Snapshot>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_level(level: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.logger.level = level.to_string();
        config
    }

    #[test]
    fn store_is_seeded_at_version_zero() {
        let store = SnapshotStore::new(AppConfig::default(), DEFAULT_MAX_HISTORY);
        assert_eq!(store.version(), 0);

        let history = store.history(0);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].version, 0);
    }

    #[test]
    fn commit_increments_version_and_reports_changes() {
        let store = SnapshotStore::new(AppConfig::default(), DEFAULT_MAX_HISTORY);

        let commit = store.commit(with_level("debug"));
        assert_eq!(commit.version, 1);
        assert_eq!(commit.changed, vec!["logger.level"]);
        assert_eq!(commit.old.logger.level, "info");
        assert_eq!(store.current().logger.level, "debug");
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn committing_an_identical_config_still_advances_the_version() {
        let store = SnapshotStore::new(AppConfig::default(), DEFAULT_MAX_HISTORY);
        let commit = store.commit(AppConfig::default());
        assert_eq!(commit.version, 1);
        assert!(commit.changed.is_empty());
    }

    #[test]
    fn history_is_bounded_and_newest_first() {
        let store = SnapshotStore::new(AppConfig::default(), 3);
        for _ in 0..10 {
            store.commit(AppConfig::default());
        }

        let history = store.history(0);
        assert_eq!(history.len(), 3);
        let versions: Vec<u64> = history.iter().map(|s| s.version).collect();
        assert_eq!(versions, vec![10, 9, 8]);
    }

    #[test]
    fn history_count_limits_the_result() {
        let store = SnapshotStore::new(AppConfig::default(), DEFAULT_MAX_HISTORY);
        for _ in 0..5 {
            store.commit(AppConfig::default());
        }
        assert_eq!(store.history(2).len(), 2);
        assert_eq!(store.history(2)[0].version, 5);
    }

    #[test]
    fn rollback_restores_the_exact_configuration() {
        let store = SnapshotStore::new(with_level("info"), DEFAULT_MAX_HISTORY);
        store.commit(with_level("debug"));
        store.commit(with_level("error"));

        let commit = store.rollback(0).unwrap();
        assert_eq!(commit.version, 3);
        assert_eq!(store.current().logger.level, "info");
        assert_eq!(store.version(), 3);
        assert_eq!(commit.changed, vec!["logger.level"]);
    }

    #[test]
    fn rollback_to_unknown_version_fails_without_state_change() {
        let store = SnapshotStore::new(AppConfig::default(), DEFAULT_MAX_HISTORY);
        store.commit(with_level("debug"));

        let err = store.rollback(9999).unwrap_err();
        assert!(matches!(err, WatchError::RollbackFailed(9999)));
        assert_eq!(store.version(), 1);
        assert_eq!(store.current().logger.level, "debug");
    }

    #[test]
    fn rollback_to_an_evicted_version_fails() {
        let store = SnapshotStore::new(AppConfig::default(), 2);
        for _ in 0..5 {
            store.commit(AppConfig::default());
        }
        // Only versions 4 and 5 remain
        assert!(store.rollback(0).is_err());
        assert!(store.rollback(4).is_ok());
    }

    #[test]
    fn zero_max_history_is_clamped_to_one() {
        let store = SnapshotStore::new(AppConfig::default(), 0);
        store.commit(AppConfig::default());
        assert_eq!(store.history(0).len(), 1);
    }
}
