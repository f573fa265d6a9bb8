//! Windows event source backed by ReadDirectoryChangesW.
//!
//! The parent directory is opened with `FILE_FLAG_OVERLAPPED` and each wait
//! issues one directory-change read, parked on a manual-reset event with a
//! bounded timeout. Records in the notification buffer are matched against
//! the watched filename case-insensitively. As on Linux, the directory-level
//! watch means atomic rename replacement and delete-then-recreate keep
//! working without re-registration.

use std::io;
use std::mem;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use std::ptr;
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::{Mutex, PoisonError};

use windows_sys::Win32::Foundation::{
    CloseHandle, HANDLE, INVALID_HANDLE_VALUE, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, ReadDirectoryChangesW, FILE_FLAG_BACKUP_SEMANTICS, FILE_FLAG_OVERLAPPED,
    FILE_LIST_DIRECTORY, FILE_NOTIFY_CHANGE_FILE_NAME, FILE_NOTIFY_CHANGE_LAST_WRITE,
    FILE_NOTIFY_CHANGE_SIZE, FILE_NOTIFY_INFORMATION, FILE_SHARE_DELETE, FILE_SHARE_READ,
    FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows_sys::Win32::System::IO::{CancelIoEx, GetOverlappedResult, OVERLAPPED};
use windows_sys::Win32::System::Threading::{
    CreateEventW, ResetEvent, SetEvent, WaitForSingleObject,
};

use crate::error::WatchError;
use crate::watch::source::{parent_dir, EventSource, WaitOutcome, SETTLE_DELAY, WAIT_TIMEOUT_MS};

const NOTIFY_BUF_LEN: usize = 4096;
const NOTIFY_FILTER: u32 =
    FILE_NOTIFY_CHANGE_LAST_WRITE | FILE_NOTIFY_CHANGE_FILE_NAME | FILE_NOTIFY_CHANGE_SIZE;

/// FILE_NOTIFY_INFORMATION records are DWORD-aligned.
#[repr(align(4))]
struct NotifyBuf([u8; NOTIFY_BUF_LEN]);

pub struct Win32Source {
    /// Directory handle; INVALID_HANDLE_VALUE once cleaned up.
    dir: AtomicIsize,
    /// Manual-reset event parked on by the waiter; signaled by cleanup.
    event: AtomicIsize,
    /// Watched filename, lowercased UTF-16.
    file_name: Vec<u16>,
    /// Notification buffer; only the watch thread takes this lock.
    buf: Mutex<Box<NotifyBuf>>,
}

// HANDLEs are just kernel object references; the struct owns them and the
// atomics gate every use after cleanup.
unsafe impl Send for Win32Source {}
unsafe impl Sync for Win32Source {}

impl Win32Source {
    pub fn new(path: &Path) -> Result<Self, WatchError> {
        let file_name = path
            .file_name()
            .map(|name| lowercase_wide(&name.encode_wide().collect::<Vec<u16>>()))
            .ok_or_else(|| WatchError::WatchFailed(format!(
                "path has no file name: {}",
                path.display()
            )))?;

        let dir_path = parent_dir(path);
        let mut wide_dir: Vec<u16> = dir_path.as_os_str().encode_wide().collect();
        wide_dir.push(0);

        let dir = unsafe {
            CreateFileW(
                wide_dir.as_ptr(),
                FILE_LIST_DIRECTORY,
                FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
                ptr::null(),
                OPEN_EXISTING,
                FILE_FLAG_BACKUP_SEMANTICS | FILE_FLAG_OVERLAPPED,
                0,
            )
        };
        if dir == INVALID_HANDLE_VALUE {
            return Err(WatchError::WatchFailed(format!(
                "open directory {} for watching: {}",
                dir_path.display(),
                io::Error::last_os_error()
            )));
        }

        let event = unsafe { CreateEventW(ptr::null(), 1, 0, ptr::null()) };
        if event == 0 {
            let err = io::Error::last_os_error();
            unsafe { CloseHandle(dir) };
            return Err(WatchError::WatchFailed(format!("create wait event: {}", err)));
        }

        Ok(Self {
            dir: AtomicIsize::new(dir),
            event: AtomicIsize::new(event),
            file_name,
            buf: Mutex::new(Box::new(NotifyBuf([0; NOTIFY_BUF_LEN]))),
        })
    }

    fn batch_matches(&self, buf: &NotifyBuf, len: usize) -> bool {
        let name_offset = mem::offset_of!(FILE_NOTIFY_INFORMATION, FileName);
        let mut offset = 0usize;

        loop {
            if offset + name_offset > len {
                return false;
            }
            let info =
                unsafe { &*(buf.0.as_ptr().add(offset).cast::<FILE_NOTIFY_INFORMATION>()) };
            let name_len = ((info.FileNameLength / 2) as usize).min((len - offset - name_offset) / 2);
            let name = unsafe {
                std::slice::from_raw_parts(ptr::addr_of!(info.FileName).cast::<u16>(), name_len)
            };
            if lowercase_wide(name) == self.file_name {
                return true;
            }
            if info.NextEntryOffset == 0 {
                return false;
            }
            offset += info.NextEntryOffset as usize;
        }
    }
}

impl EventSource for Win32Source {
    fn wait_for_event(&self) -> WaitOutcome {
        let dir = self.dir.load(Ordering::Acquire) as HANDLE;
        let event = self.event.load(Ordering::Acquire) as HANDLE;
        if dir == INVALID_HANDLE_VALUE {
            return WaitOutcome::Error;
        }

        let mut buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        let mut overlapped: OVERLAPPED = unsafe { mem::zeroed() };
        overlapped.hEvent = event;

        let issued = unsafe {
            ReadDirectoryChangesW(
                dir,
                buf.0.as_mut_ptr().cast(),
                NOTIFY_BUF_LEN as u32,
                0,
                NOTIFY_FILTER,
                ptr::null_mut(),
                &mut overlapped,
                None,
            )
        };
        if issued == 0 {
            return WaitOutcome::Error;
        }

        match unsafe { WaitForSingleObject(event, WAIT_TIMEOUT_MS as u32) } {
            WAIT_TIMEOUT => {
                // Abandon this read; the next wait re-issues it.
                unsafe {
                    CancelIoEx(dir, &overlapped);
                    let mut ignored = 0u32;
                    GetOverlappedResult(dir, &overlapped, &mut ignored, 1);
                    ResetEvent(event);
                }
                WaitOutcome::Timeout
            }
            WAIT_OBJECT_0 => {
                let mut bytes = 0u32;
                let ok = unsafe { GetOverlappedResult(dir, &overlapped, &mut bytes, 0) };
                unsafe { ResetEvent(event) };
                if ok == 0 {
                    return WaitOutcome::Error;
                }

                // A zero-length result means the buffer overflowed; something
                // changed, we just don't know what. Reload to be safe.
                if bytes == 0 || self.batch_matches(&buf, bytes as usize) {
                    std::thread::sleep(SETTLE_DELAY);
                    return WaitOutcome::Changed;
                }
                WaitOutcome::Timeout
            }
            _ => WaitOutcome::Error,
        }
    }

    fn cleanup(&self) {
        let dir = self.dir.swap(INVALID_HANDLE_VALUE, Ordering::AcqRel) as HANDLE;
        if dir != INVALID_HANDLE_VALUE {
            unsafe {
                CancelIoEx(dir, ptr::null());
                CloseHandle(dir);
            }
        }
        // Wake a parked waiter; it observes the poisoned handle and exits.
        let event = self.event.load(Ordering::Acquire) as HANDLE;
        if event != 0 {
            unsafe { SetEvent(event) };
        }
    }
}

impl Drop for Win32Source {
    fn drop(&mut self) {
        self.cleanup();
        let event = self.event.swap(0, Ordering::AcqRel) as HANDLE;
        if event != 0 {
            unsafe { CloseHandle(event) };
        }
    }
}

fn lowercase_wide(name: &[u16]) -> Vec<u16> {
    name.iter()
        .map(|&unit| {
            if (u16::from(b'A')..=u16::from(b'Z')).contains(&unit) {
                unit + 32
            } else {
                unit
            }
        })
        .collect()
}
