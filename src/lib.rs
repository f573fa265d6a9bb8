//! Hot-reloadable configuration with version history.
//!
//! # Architecture Overview
//!
//! ```text
//!   config file (TOML)
//!       │  change detected (inotify / kqueue / ReadDirectoryChangesW)
//!       ▼
//!   ┌───────────────┐    ┌───────────────┐    ┌───────────────┐
//!   │ watch::source │───▶│ config::loader│───▶│    config::   │
//!   │  (event loop) │    │  + env merge  │    │   validation  │
//!   └───────────────┘    └───────────────┘    └───────┬───────┘
//!                                                     │ valid
//!                                                     ▼
//!   ┌───────────────┐    ┌───────────────┐    ┌───────────────┐
//!   │  change/error │◀───│ watch::events │◀───│  watch::store │
//!   │   callbacks   │    │  (change log) │    │ commit + diff │
//!   └───────────────┘    └───────────────┘    └───────────────┘
//! ```
//!
//! A [`ConfigWatcher`] owns one background thread that blocks on the
//! platform's native file-change primitive and runs the reload pipeline on
//! every relevant change. Readers get the current configuration through an
//! atomic pointer swap and never block on a reload in progress. Every
//! successful commit is versioned and retained in a bounded history, so a bad
//! configuration push can be rolled back without touching the file on disk.
//!
//! Failed reloads (unreadable, unparsable, or semantically invalid files)
//! never disturb the running configuration: the application keeps its
//! last-known-good config and the failure is surfaced through the event log
//! and error callbacks.

// Core subsystems
pub mod config;
pub mod watch;

// Cross-cutting concerns
pub mod error;

pub use config::loader::ConfigError;
pub use config::schema::AppConfig;
pub use error::WatchError;
pub use watch::events::ChangeEvent;
pub use watch::source::{EventSource, WaitOutcome};
pub use watch::store::Snapshot;
pub use watch::watcher::ConfigWatcher;
