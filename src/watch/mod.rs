//! File watching and the versioned reload pipeline.
//!
//! # Data Flow
//! ```text
//! OS change notification (inotify / kqueue / ReadDirectoryChangesW)
//!     → source.rs (bounded blocking wait, settle delay, filename filter)
//!     → watcher.rs reload pipeline:
//!         load → validate → diff → commit → record event → notify callbacks
//!     → store.rs (atomic current swap, version counter, bounded history)
//!     → events.rs (bounded change-attempt log)
//! ```
//!
//! # Design Decisions
//! - One dedicated background thread per watcher; manual `reload()` and
//!   `rollback()` run the same pipeline on the caller's thread
//! - Load/validation failures touch nothing: the commit in store.rs is the
//!   single mutation point
//! - Callbacks run outside every lock; a panicking subscriber is isolated
//!   and cannot take the watcher down

pub mod events;
pub mod source;
pub mod store;
pub mod watcher;

#[cfg(target_os = "linux")]
pub mod inotify;

#[cfg(any(target_os = "macos", target_os = "freebsd"))]
pub mod kqueue;

#[cfg(target_os = "windows")]
pub mod win32;

pub use events::ChangeEvent;
pub use source::{EventSource, WaitOutcome};
pub use store::Snapshot;
pub use watcher::ConfigWatcher;
