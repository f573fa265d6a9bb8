//! Watcher error taxonomy.

use thiserror::Error;

/// Errors surfaced by the configuration watcher.
///
/// Loader errors ([`crate::ConfigError`]) are wrapped rather than redefined:
/// a failed load or validation during a reload is reported here with the
/// loader's message carried along.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The OS-level file watch could not be established.
    #[error("failed to establish file watch: {0}")]
    WatchFailed(String),

    /// The configuration file could not be read or parsed during a reload.
    #[error("reload failed: {0}")]
    ReloadFailed(String),

    /// The file was readable but semantically invalid.
    #[error("configuration validation failed: {0}")]
    ValidationFailed(String),

    /// The requested version is not present in the snapshot history.
    #[error("no snapshot with version {0} in history")]
    RollbackFailed(u64),

    /// The watcher has not been started.
    #[error("watcher has not been started")]
    NotStarted,

    /// `start()` was called while the watcher was already running.
    #[error("watcher is already running")]
    AlreadyRunning,

    /// No file-watch backend exists for this operating system.
    #[error("file watching is not supported on this platform")]
    PlatformNotSupported,
}
