//! macOS/FreeBSD event source backed by kqueue.
//!
//! kqueue watches the open file descriptor (the inode), not the name, so a
//! delete or rename invalidates the registration. When that happens the
//! source re-opens the path and re-registers; if the file has not been
//! recreated yet the re-open simply fails and the reload is deferred until
//! the next event. If the file is already missing at init time the parent
//! directory is watched instead, which at least surfaces writes that recreate
//! it.

use std::ffi::CString;
use std::io;
use std::mem;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::error::WatchError;
use crate::watch::source::{parent_dir, EventSource, WaitOutcome, SETTLE_DELAY};

const VNODE_FLAGS: u32 = libc::NOTE_WRITE
    | libc::NOTE_EXTEND
    | libc::NOTE_RENAME
    | libc::NOTE_DELETE
    | libc::NOTE_ATTRIB;

pub struct KqueueSource {
    /// kqueue descriptor; -1 once cleaned up. Closing it from another thread
    /// is the cancellation mechanism: the blocked kevent call fails over.
    kq: AtomicI32,
    /// Currently registered file (or directory) descriptor.
    file_fd: Mutex<libc::c_int>,
    path: PathBuf,
}

impl KqueueSource {
    pub fn new(path: &Path) -> Result<Self, WatchError> {
        let kq = unsafe { libc::kqueue() };
        if kq < 0 {
            return Err(WatchError::WatchFailed(format!(
                "kqueue: {}",
                io::Error::last_os_error()
            )));
        }

        let fd = match open_readonly(path) {
            Ok(fd) => fd,
            // File not there yet: fall back to the parent directory so a
            // recreating write still produces an event.
            Err(_) => match open_readonly(parent_dir(path)) {
                Ok(fd) => fd,
                Err(err) => {
                    unsafe { libc::close(kq) };
                    return Err(WatchError::WatchFailed(format!(
                        "open {} for watching: {}",
                        path.display(),
                        err
                    )));
                }
            },
        };

        if let Err(err) = register(kq, fd) {
            unsafe {
                libc::close(fd);
                libc::close(kq);
            }
            return Err(WatchError::WatchFailed(format!("kevent register: {}", err)));
        }

        Ok(Self {
            kq: AtomicI32::new(kq),
            file_fd: Mutex::new(fd),
            path: path.to_path_buf(),
        })
    }

    /// After a delete or rename the descriptor points at a dead inode; try to
    /// follow the path to its replacement.
    fn rewatch(&self, kq: libc::c_int) {
        let mut file_fd = self.file_fd.lock().unwrap_or_else(PoisonError::into_inner);
        if *file_fd >= 0 {
            unsafe { libc::close(*file_fd) };
            *file_fd = -1;
        }
        match open_readonly(&self.path) {
            Ok(fd) => {
                if register(kq, fd).is_err() {
                    unsafe { libc::close(fd) };
                } else {
                    *file_fd = fd;
                }
            }
            Err(_) => {
                // Not recreated yet; the reload stays deferred.
            }
        }
    }

    /// Swallow events already queued for the same write burst.
    fn drain(&self, kq: libc::c_int) {
        let zero = libc::timespec { tv_sec: 0, tv_nsec: 0 };
        loop {
            let mut event: libc::kevent = unsafe { mem::zeroed() };
            let n = unsafe { libc::kevent(kq, ptr::null(), 0, &mut event, 1, &zero) };
            if n <= 0 {
                break;
            }
            if event.fflags & (libc::NOTE_DELETE | libc::NOTE_RENAME) != 0 {
                self.rewatch(kq);
            }
        }
    }
}

impl EventSource for KqueueSource {
    fn wait_for_event(&self) -> WaitOutcome {
        let kq = self.kq.load(Ordering::Acquire);
        if kq < 0 {
            return WaitOutcome::Error;
        }

        let timeout = libc::timespec { tv_sec: 0, tv_nsec: 500_000_000 };
        let mut event: libc::kevent = unsafe { mem::zeroed() };
        let n = unsafe { libc::kevent(kq, ptr::null(), 0, &mut event, 1, &timeout) };

        if n < 0 {
            let err = io::Error::last_os_error();
            return if err.kind() == io::ErrorKind::Interrupted {
                WaitOutcome::Timeout
            } else {
                WaitOutcome::Error
            };
        }
        if n == 0 {
            return WaitOutcome::Timeout;
        }

        if event.fflags & (libc::NOTE_DELETE | libc::NOTE_RENAME) != 0 {
            self.rewatch(kq);
        }

        if event.fflags
            & (libc::NOTE_WRITE | libc::NOTE_EXTEND | libc::NOTE_RENAME | libc::NOTE_ATTRIB)
            != 0
        {
            std::thread::sleep(SETTLE_DELAY);
            self.drain(kq);
            return WaitOutcome::Changed;
        }

        WaitOutcome::Timeout
    }

    fn cleanup(&self) {
        // Close only the kqueue here; that unblocks the waiting thread. The
        // file descriptor is released on drop.
        let kq = self.kq.swap(-1, Ordering::AcqRel);
        if kq >= 0 {
            unsafe { libc::close(kq) };
        }
    }
}

impl Drop for KqueueSource {
    fn drop(&mut self) {
        self.cleanup();
        let mut file_fd = self.file_fd.lock().unwrap_or_else(PoisonError::into_inner);
        if *file_fd >= 0 {
            unsafe { libc::close(*file_fd) };
            *file_fd = -1;
        }
    }
}

fn open_readonly(path: &Path) -> io::Result<libc::c_int> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"))?;
    let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDONLY) };
    if fd < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(fd)
    }
}

fn register(kq: libc::c_int, fd: libc::c_int) -> io::Result<()> {
    let mut change: libc::kevent = unsafe { mem::zeroed() };
    change.ident = fd as libc::uintptr_t;
    change.filter = libc::EVFILT_VNODE;
    change.flags = libc::EV_ADD | libc::EV_ENABLE | libc::EV_CLEAR;
    change.fflags = VNODE_FLAGS;

    let rc = unsafe { libc::kevent(kq, &change, 1, ptr::null_mut(), 0, ptr::null()) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}
