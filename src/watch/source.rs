//! Platform event source abstraction.
//!
//! Each operating system gets one self-contained backend implementing
//! [`EventSource`]; the watch thread drives whichever one
//! [`platform_source`] selects. A manually triggered double lives in the
//! test module so the controller and pipeline can be exercised without real
//! filesystem events.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::WatchError;

/// Upper bound on a single blocking wait, so the watch thread can observe a
/// stop request promptly even when the file never changes.
pub(crate) const WAIT_TIMEOUT_MS: i32 = 500;

/// Fixed delay between detecting a change and reloading, so a burst of write
/// events (truncate + write + close) coalesces into one reload.
pub(crate) const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Outcome of one bounded wait on an event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Nothing happened within the wait window; re-check and wait again.
    Timeout,

    /// The watched file plausibly changed; reload.
    Changed,

    /// The source is unusable (cleaned up or OS failure); leave the loop.
    Error,
}

/// A blocking, cancelable source of file-change notifications.
///
/// Implementations are created with the watch already established (a failed
/// constructor is the `watch_failed` path) and must satisfy two contracts:
///
/// - `wait_for_event` returns within roughly [`WAIT_TIMEOUT_MS`] even when
///   nothing changes, and applies [`SETTLE_DELAY`] before reporting
///   [`WaitOutcome::Changed`] so rapid event bursts collapse into one.
/// - `cleanup` may be called from any thread while another thread sits in
///   `wait_for_event`, and permanently poisons the source: subsequent waits
///   return [`WaitOutcome::Error`] within one timeout window.
pub trait EventSource: Send + Sync {
    /// Block until the watched file changes, the wait window elapses, or the
    /// source fails.
    fn wait_for_event(&self) -> WaitOutcome;

    /// Release the OS watch handle and unblock any in-flight wait.
    fn cleanup(&self);
}

/// Select the event source for the current operating system.
pub fn platform_source(path: &Path) -> Result<Arc<dyn EventSource>, WatchError> {
    #[cfg(target_os = "linux")]
    {
        Ok(Arc::new(super::inotify::InotifySource::new(path)?))
    }

    #[cfg(any(target_os = "macos", target_os = "freebsd"))]
    {
        Ok(Arc::new(super::kqueue::KqueueSource::new(path)?))
    }

    #[cfg(target_os = "windows")]
    {
        Ok(Arc::new(super::win32::Win32Source::new(path)?))
    }

    #[cfg(not(any(
        target_os = "linux",
        target_os = "macos",
        target_os = "freebsd",
        target_os = "windows"
    )))]
    {
        let _ = path;
        Err(WatchError::PlatformNotSupported)
    }
}

/// Resolve the directory whose contents should be watched for `path`.
///
/// A bare filename has an empty parent; treat that as the current directory.
#[allow(dead_code)] // each platform backend uses it; not all are compiled at once
pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::{EventSource, WaitOutcome, WAIT_TIMEOUT_MS};

    /// Manually triggered event source for exercising the watch loop without
    /// touching the filesystem.
    pub(crate) struct ManualSource {
        rx: Mutex<Receiver<()>>,
        closed: AtomicBool,
    }

    impl ManualSource {
        /// Returns the source plus a trigger; every send produces one
        /// `Changed` outcome.
        pub(crate) fn pair() -> (Arc<ManualSource>, Sender<()>) {
            let (tx, rx) = mpsc::channel();
            let source = Arc::new(ManualSource {
                rx: Mutex::new(rx),
                closed: AtomicBool::new(false),
            });
            (source, tx)
        }
    }

    impl EventSource for ManualSource {
        fn wait_for_event(&self) -> WaitOutcome {
            if self.closed.load(Ordering::Acquire) {
                return WaitOutcome::Error;
            }
            let rx = self.rx.lock().unwrap_or_else(|e| e.into_inner());
            match rx.recv_timeout(Duration::from_millis(WAIT_TIMEOUT_MS as u64)) {
                Ok(()) => WaitOutcome::Changed,
                Err(RecvTimeoutError::Timeout) => WaitOutcome::Timeout,
                Err(RecvTimeoutError::Disconnected) => WaitOutcome::Error,
            }
        }

        fn cleanup(&self) {
            self.closed.store(true, Ordering::Release);
        }
    }

    #[test]
    fn manual_source_reports_changes_then_errors_after_cleanup() {
        let (source, tx) = ManualSource::pair();
        tx.send(()).unwrap();
        assert_eq!(source.wait_for_event(), WaitOutcome::Changed);

        source.cleanup();
        assert_eq!(source.wait_for_event(), WaitOutcome::Error);
    }
}
