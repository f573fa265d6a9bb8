//! End-to-end tests driving the watcher through the real platform backend.
//!
//! Filesystem notification latency varies across platforms and CI machines,
//! so state changes are observed by polling with generous deadlines rather
//! than fixed sleeps.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use hot_config::{AppConfig, ConfigWatcher, WatchError};

fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    predicate()
}

fn write_config(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
}

#[test]
fn full_lifecycle_reload_failure_and_rollback() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    // Missing file: defaults at version 0.
    let watcher = ConfigWatcher::new(&path);
    assert_eq!(*watcher.current(), AppConfig::default());
    assert_eq!(watcher.version(), 0);

    let changes = Arc::new(Mutex::new(Vec::<(AppConfig, AppConfig)>::new()));
    let errors = Arc::new(AtomicUsize::new(0));
    {
        let changes = changes.clone();
        watcher.on_change(move |old, new| {
            changes.lock().unwrap().push((old.clone(), new.clone()));
        });
    }
    {
        let errors = errors.clone();
        watcher.on_error(move |_| {
            errors.fetch_add(1, Ordering::SeqCst);
        });
    }

    watcher.start().unwrap();
    assert!(watcher.is_running());

    // A valid file with one changed field appears.
    write_config(&path, "[logger]\nlevel = \"debug\"\n");
    assert!(
        wait_until(Duration::from_secs(10), || {
            watcher.version() == 1 && changes.lock().unwrap().len() == 1
        }),
        "file creation was not picked up"
    );
    assert_eq!(watcher.current().logger.level, "debug");

    {
        let changes = changes.lock().unwrap();
        assert_eq!(changes.len(), 1, "write burst was not coalesced into one reload");
        let (old, new) = &changes[0];
        assert_eq!(old.logger.level, "info");
        assert_eq!(new.logger.level, "debug");
        // Only that field differs.
        let mut expected = old.clone();
        expected.logger.level = "debug".to_string();
        assert_eq!(*new, expected);
    }
    let events = watcher.recent_events(1);
    assert!(events[0].success);
    assert_eq!(events[0].changed_fields, vec!["logger.level"]);

    // An invalid file keeps the last-known-good configuration.
    write_config(&path, "[logger]\nlevel = \"verbose\"\n");
    assert!(
        wait_until(Duration::from_secs(10), || {
            watcher.recent_events(1).first().is_some_and(|event| !event.success)
        }),
        "failed reload was not recorded"
    );
    assert_eq!(watcher.version(), 1);
    assert_eq!(watcher.current().logger.level, "debug");
    assert!(errors.load(Ordering::SeqCst) >= 1);

    // Rollback to the initial defaults is a fresh commit.
    watcher.rollback(0).unwrap();
    assert_eq!(watcher.version(), 2);
    assert_eq!(*watcher.current(), AppConfig::default());

    watcher.stop();
    assert!(!watcher.is_running());
    watcher.stop();
    assert!(!watcher.is_running());
}

#[test]
fn versions_climb_monotonically_across_reloads_and_rollbacks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    write_config(&path, "");

    let watcher = ConfigWatcher::new(&path);
    let mut seen = vec![watcher.version()];

    for level in ["debug", "warn", "error"] {
        write_config(&path, &format!("[logger]\nlevel = \"{level}\"\n"));
        watcher.reload().unwrap();
        seen.push(watcher.version());
    }
    watcher.rollback(1).unwrap();
    seen.push(watcher.version());
    watcher.rollback(0).unwrap();
    seen.push(watcher.version());

    assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(watcher.current().logger.level, "info");
}

#[test]
fn history_keeps_only_the_most_recent_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    write_config(&path, "");

    let watcher = ConfigWatcher::with_max_history(&path, 4);
    for size in 1..=8 {
        write_config(&path, &format!("[thread]\npool_size = {size}\n"));
        watcher.reload().unwrap();
    }

    let history = watcher.history(0);
    assert_eq!(history.len(), 4);
    let versions: Vec<u64> = history.iter().map(|snapshot| snapshot.version).collect();
    assert_eq!(versions, vec![8, 7, 6, 5]);

    // Evicted versions can no longer be rolled back to.
    assert!(matches!(watcher.rollback(2), Err(WatchError::RollbackFailed(2))));
    watcher.rollback(5).unwrap();
    assert_eq!(watcher.current().thread.pool_size, 5);
}

#[test]
fn rollback_restores_a_structurally_equal_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    write_config(
        &path,
        "[logger]\nlevel = \"debug\"\nwriters = [\"console\", \"json\"]\n\n[network]\ncompression = \"zstd\"\n",
    );

    let watcher = ConfigWatcher::new(&path);
    let original = watcher.current();

    write_config(&path, "[logger]\nlevel = \"warn\"\n");
    watcher.reload().unwrap();
    assert_ne!(*watcher.current(), *original);

    watcher.rollback(0).unwrap();
    assert_eq!(*watcher.current(), *original);
}

#[test]
fn atomic_rename_replacement_triggers_a_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    write_config(&path, "");

    let watcher = ConfigWatcher::new(&path);
    watcher.start().unwrap();

    // Editor-style atomic save: write a temp file, rename over the target.
    let staged = dir.path().join(".config.toml.swap");
    write_config(&staged, "[monitoring]\nmetrics_interval_ms = 2500\n");
    fs::rename(&staged, &path).unwrap();

    assert!(
        wait_until(Duration::from_secs(10), || {
            watcher.current().monitoring.metrics_interval_ms == 2500
        }),
        "rename replacement was not picked up"
    );

    watcher.stop();
}

#[test]
fn start_twice_fails_and_watcher_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    write_config(&path, "");

    let watcher = ConfigWatcher::new(&path);
    watcher.start().unwrap();
    assert!(matches!(watcher.start(), Err(WatchError::AlreadyRunning)));
    watcher.stop();

    watcher.start().unwrap();
    write_config(&path, "[logger]\nlevel = \"warn\"\n");
    assert!(wait_until(Duration::from_secs(10), || watcher.version() >= 1));
    watcher.stop();
}

#[test]
fn watch_setup_failure_leaves_the_watcher_stopped() {
    let watcher = ConfigWatcher::new("/nonexistent-hot-config-dir/config.toml");
    let err = watcher.start().unwrap_err();
    assert!(matches!(err, WatchError::WatchFailed(_)));
    assert!(!watcher.is_running());
}

#[test]
fn dropping_a_running_watcher_stops_it_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    write_config(&path, "");

    let watcher = ConfigWatcher::new(&path);
    watcher.start().unwrap();
    drop(watcher); // must join the background thread without hanging
}

#[test]
fn broken_file_leaves_last_known_good_config_in_service() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    write_config(&path, "[database]\nbackend = \"sqlite\"\n");

    let watcher = ConfigWatcher::new(&path);
    watcher.start().unwrap();

    let errors = Arc::new(AtomicUsize::new(0));
    {
        let errors = errors.clone();
        watcher.on_error(move |_| {
            errors.fetch_add(1, Ordering::SeqCst);
        });
    }

    write_config(&path, "[database\nbackend = ");
    assert!(wait_until(Duration::from_secs(10), || {
        errors.load(Ordering::SeqCst) >= 1
    }));
    assert_eq!(watcher.version(), 0);
    assert_eq!(watcher.current().database.backend, "sqlite");

    // Repeated failures never kill the watcher thread.
    write_config(&path, "[database\nstill = broken");
    assert!(wait_until(Duration::from_secs(10), || {
        errors.load(Ordering::SeqCst) >= 2
    }));
    assert!(watcher.is_running());

    // A fixed file recovers on the next change.
    write_config(&path, "[database]\nbackend = \"redis\"\n");
    assert!(wait_until(Duration::from_secs(10), || {
        watcher.current().database.backend == "redis"
    }));

    watcher.stop();
}
