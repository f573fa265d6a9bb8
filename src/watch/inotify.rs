//! Linux event source backed by inotify.
//!
//! The watch is placed on the parent directory rather than the file itself,
//! so atomic replacement (write to temp file, rename over the target) and
//! delete-then-recreate both keep working: events are filtered by filename
//! from the notification stream. While the file is absent no error is
//! raised; the reload simply fires again on the next matching create/write.

use std::ffi::CString;
use std::io;
use std::mem;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::error::WatchError;
use crate::watch::source::{parent_dir, EventSource, WaitOutcome, SETTLE_DELAY, WAIT_TIMEOUT_MS};

const EVENT_BUF_LEN: usize = 4096;
const WATCH_MASK: u32 =
    libc::IN_MODIFY | libc::IN_CREATE | libc::IN_MOVED_TO | libc::IN_CLOSE_WRITE;

/// inotify event records carry a 4-byte-aligned header.
#[repr(align(4))]
struct EventBuf([u8; EVENT_BUF_LEN]);

#[derive(Debug)]
pub struct InotifySource {
    /// inotify instance descriptor; -1 once cleaned up.
    fd: AtomicI32,
    watch_fd: AtomicI32,
    /// Name of the watched file inside the watched directory.
    file_name: Vec<u8>,
}

impl InotifySource {
    pub fn new(path: &Path) -> Result<Self, WatchError> {
        let file_name = path
            .file_name()
            .map(|name| name.as_bytes().to_vec())
            .ok_or_else(|| WatchError::WatchFailed(format!(
                "path has no file name: {}",
                path.display()
            )))?;

        let fd = unsafe { libc::inotify_init1(libc::IN_NONBLOCK) };
        if fd < 0 {
            return Err(WatchError::WatchFailed(format!(
                "inotify_init1: {}",
                io::Error::last_os_error()
            )));
        }

        let dir = parent_dir(path);
        let c_dir = CString::new(dir.as_os_str().as_bytes()).map_err(|_| {
            WatchError::WatchFailed(format!("directory path contains NUL: {}", dir.display()))
        })?;

        let watch_fd = unsafe { libc::inotify_add_watch(fd, c_dir.as_ptr(), WATCH_MASK) };
        if watch_fd < 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(WatchError::WatchFailed(format!(
                "inotify_add_watch on {}: {}",
                dir.display(),
                err
            )));
        }

        Ok(Self {
            fd: AtomicI32::new(fd),
            watch_fd: AtomicI32::new(watch_fd),
            file_name,
        })
    }

    /// Scan a batch of inotify records for an event on the watched filename.
    fn batch_matches(&self, buf: &EventBuf, len: usize) -> bool {
        let header_len = mem::size_of::<libc::inotify_event>();
        let mut offset = 0;

        while offset + header_len <= len {
            // The buffer is 4-byte aligned and the kernel writes whole records.
            let event = unsafe { &*(buf.0.as_ptr().add(offset).cast::<libc::inotify_event>()) };
            let name_len = event.len as usize;

            if name_len > 0 && event.mask & WATCH_MASK != 0 {
                let name_start = offset + header_len;
                let name_end = (name_start + name_len).min(len);
                let padded = &buf.0[name_start..name_end];
                // Names are NUL-padded to the record length.
                let name = padded.split(|byte| *byte == 0).next().unwrap_or(&[]);
                if name == self.file_name.as_slice() {
                    return true;
                }
            }

            offset += header_len + name_len;
        }

        false
    }

    /// Consume anything still queued, so one burst of writes coalesces into a
    /// single reload. The descriptor is non-blocking.
    fn drain(&self, fd: i32) {
        let mut buf = EventBuf([0; EVENT_BUF_LEN]);
        loop {
            let len = unsafe {
                libc::read(fd, buf.0.as_mut_ptr().cast(), EVENT_BUF_LEN)
            };
            if len <= 0 {
                break;
            }
        }
    }
}

impl EventSource for InotifySource {
    fn wait_for_event(&self) -> WaitOutcome {
        let fd = self.fd.load(Ordering::Acquire);
        if fd < 0 {
            return WaitOutcome::Error;
        }

        let mut pollfd = libc::pollfd { fd, events: libc::POLLIN, revents: 0 };
        let ready = unsafe { libc::poll(&mut pollfd, 1, WAIT_TIMEOUT_MS) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            return if err.kind() == io::ErrorKind::Interrupted {
                WaitOutcome::Timeout
            } else {
                WaitOutcome::Error
            };
        }
        if ready == 0 {
            return WaitOutcome::Timeout;
        }

        let mut buf = EventBuf([0; EVENT_BUF_LEN]);
        let len = unsafe { libc::read(fd, buf.0.as_mut_ptr().cast(), EVENT_BUF_LEN) };
        if len < 0 {
            let err = io::Error::last_os_error();
            return match err.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => WaitOutcome::Timeout,
                _ => WaitOutcome::Error,
            };
        }

        if !self.batch_matches(&buf, len as usize) {
            return WaitOutcome::Timeout;
        }

        // Let the write burst finish, then swallow the events it produced.
        std::thread::sleep(SETTLE_DELAY);
        self.drain(fd);
        WaitOutcome::Changed
    }

    fn cleanup(&self) {
        let watch_fd = self.watch_fd.swap(-1, Ordering::AcqRel);
        let fd = self.fd.swap(-1, Ordering::AcqRel);
        if fd >= 0 {
            if watch_fd >= 0 {
                unsafe { libc::inotify_rm_watch(fd, watch_fd) };
            }
            unsafe { libc::close(fd) };
        }
    }
}

impl Drop for InotifySource {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, Instant};

    fn wait_for_change(source: &InotifySource, timeout: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            match source.wait_for_event() {
                WaitOutcome::Changed => return true,
                WaitOutcome::Timeout => continue,
                WaitOutcome::Error => return false,
            }
        }
        false
    }

    #[test]
    fn init_fails_for_a_missing_directory() {
        let err = InotifySource::new(Path::new("/no/such/dir/config.toml")).unwrap_err();
        assert!(matches!(err, WatchError::WatchFailed(_)));
    }

    #[test]
    fn detects_a_write_to_the_watched_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "a = 1\n").unwrap();

        let source = InotifySource::new(&path).unwrap();
        fs::write(&path, "a = 2\n").unwrap();

        assert!(wait_for_change(&source, Duration::from_secs(5)));
    }

    #[test]
    fn ignores_writes_to_sibling_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "a = 1\n").unwrap();

        let source = InotifySource::new(&path).unwrap();
        fs::write(dir.path().join("other.toml"), "b = 2\n").unwrap();

        assert_eq!(source.wait_for_event(), WaitOutcome::Timeout);
    }

    #[test]
    fn detects_the_file_being_created_later() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let source = InotifySource::new(&path).unwrap();
        fs::write(&path, "a = 1\n").unwrap();

        assert!(wait_for_change(&source, Duration::from_secs(5)));
    }

    #[test]
    fn detects_atomic_rename_replacement() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "a = 1\n").unwrap();

        let source = InotifySource::new(&path).unwrap();
        let staged = dir.path().join("config.toml.tmp");
        fs::write(&staged, "a = 2\n").unwrap();
        // Consume the staging-file noise (it never matches the filename).
        while source.wait_for_event() == WaitOutcome::Changed {}
        fs::rename(&staged, &path).unwrap();

        assert!(wait_for_change(&source, Duration::from_secs(5)));
    }

    #[test]
    fn cleanup_poisons_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "a = 1\n").unwrap();

        let source = InotifySource::new(&path).unwrap();
        source.cleanup();
        assert_eq!(source.wait_for_event(), WaitOutcome::Error);
        // Idempotent
        source.cleanup();
    }
}
