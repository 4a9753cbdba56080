// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 chainqueue contributors
//
// Windows backing for a locked, memory-mapped regular file: `CreateFileW`,
// `LockFileEx` for the whole-file exclusive lock, a file mapping + view for
// the mapped region, `FlushViewOfFile`/`FlushFileBuffers` as the durability
// barrier.

use std::io;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use std::ptr;

use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, ERROR_LOCK_VIOLATION, HANDLE};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, DeleteFileW, FlushFileBuffers, LockFileEx, UnlockFile, FILE_FLAG_BACKUP_SEMANTICS,
    FILE_GENERIC_READ, FILE_GENERIC_WRITE, FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE,
    LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, OPEN_ALWAYS, OPEN_EXISTING,
};
use windows_sys::Win32::System::Memory::{
    CreateFileMappingW, FlushViewOfFile, MapViewOfFile, UnmapViewOfFile, FILE_MAP_WRITE,
    PAGE_READWRITE,
};

fn to_wide(path: &Path) -> Vec<u16> {
    path.as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

/// A regular file, exclusively locked for the lifetime of the handle and
/// memory-mapped over its current length.
pub struct LockedFile {
    handle: HANDLE,
    mapping: HANDLE,
    map: *mut u8,
    len: usize,
}

unsafe impl Send for LockedFile {}

impl LockedFile {
    /// Open `path` for read/write, creating it if missing, and take an
    /// exclusive, non-blocking whole-file lock.
    ///
    /// Returns an `io::Error` of kind `WouldBlock` if the lock is already
    /// held by another process — callers map that to `Error::AlreadyOpen`.
    pub fn open(path: &Path, create: bool) -> io::Result<Self> {
        let wide = to_wide(path);
        let disposition = if create { OPEN_ALWAYS } else { OPEN_EXISTING };
        let handle = unsafe {
            CreateFileW(
                wide.as_ptr(),
                FILE_GENERIC_READ | FILE_GENERIC_WRITE,
                FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
                ptr::null(),
                disposition,
                FILE_FLAG_BACKUP_SEMANTICS,
                0,
            )
        };
        if handle == -1 {
            return Err(io::Error::last_os_error());
        }

        let mut overlapped: windows_sys::Win32::System::IO::OVERLAPPED =
            unsafe { std::mem::zeroed() };
        let ok = unsafe {
            LockFileEx(
                handle,
                LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
                0,
                !0,
                !0,
                &mut overlapped,
            )
        };
        if ok == 0 {
            let err = unsafe { GetLastError() };
            unsafe { CloseHandle(handle) };
            if err == ERROR_LOCK_VIOLATION {
                return Err(io::Error::from(io::ErrorKind::WouldBlock));
            }
            return Err(io::Error::from_raw_os_error(err as i32));
        }

        Ok(Self {
            handle,
            mapping: 0,
            map: ptr::null_mut(),
            len: 0,
        })
    }

    /// Current length of the backing file, independent of the mapped region.
    pub fn file_len(&self) -> io::Result<u64> {
        use windows_sys::Win32::Storage::FileSystem::GetFileSizeEx;
        let mut size: i64 = 0;
        let ok = unsafe { GetFileSizeEx(self.handle, &mut size) };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(size as u64)
    }

    /// Resize the file to exactly `len` bytes and (re-)map that whole range.
    /// Any previous mapping is unmapped first.
    pub fn set_len_and_map(&mut self, len: usize) -> io::Result<()> {
        use windows_sys::Win32::Storage::FileSystem::{SetEndOfFile, SetFilePointerEx, FILE_BEGIN};

        self.unmap();

        let mut pos: i64 = 0;
        let ok = unsafe { SetFilePointerEx(self.handle, len as i64, &mut pos, FILE_BEGIN) };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        if unsafe { SetEndOfFile(self.handle) } == 0 {
            return Err(io::Error::last_os_error());
        }

        if len == 0 {
            self.len = 0;
            return Ok(());
        }

        let mapping = unsafe {
            CreateFileMappingW(self.handle, ptr::null(), PAGE_READWRITE, 0, len as u32, ptr::null())
        };
        if mapping == 0 {
            return Err(io::Error::last_os_error());
        }

        let mem = unsafe { MapViewOfFile(mapping, FILE_MAP_WRITE, 0, 0, len) };
        if mem.is_null() {
            let err = io::Error::last_os_error();
            unsafe { CloseHandle(mapping) };
            return Err(err);
        }

        self.mapping = mapping;
        self.map = mem as *mut u8;
        self.len = len;
        Ok(())
    }

    fn unmap(&mut self) {
        if !self.map.is_null() {
            unsafe { UnmapViewOfFile(self.map as *const _) };
            self.map = ptr::null_mut();
            self.len = 0;
        }
        if self.mapping != 0 {
            unsafe { CloseHandle(self.mapping) };
            self.mapping = 0;
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        if self.map.is_null() {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(self.map, self.len) }
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        if self.map.is_null() {
            &mut []
        } else {
            unsafe { std::slice::from_raw_parts_mut(self.map, self.len) }
        }
    }

    /// Flush the mapped region to the backing file (durability barrier).
    pub fn flush(&self) -> io::Result<()> {
        if self.map.is_null() {
            return Ok(());
        }
        if unsafe { FlushViewOfFile(self.map as *const _, self.len) } == 0 {
            return Err(io::Error::last_os_error());
        }
        if unsafe { FlushFileBuffers(self.handle) } == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Unmap and unlock, but leave the file on disk.
    pub fn close(mut self) -> io::Result<()> {
        self.flush()?;
        self.unmap();
        unsafe { UnlockFile(self.handle, 0, 0, !0, !0) };
        unsafe { CloseHandle(self.handle) };
        self.handle = 0;
        Ok(())
    }

    /// Unmap, unlock, close, and remove the file from disk.
    ///
    /// Windows refuses to delete a file while any handle to it remains open
    /// without `FILE_SHARE_DELETE` — the handle here is always opened with
    /// that share flag, so the delete below succeeds once the mapping and
    /// handle are released by `close`. If a future caller ever opens without
    /// that flag, deletion should be deferred to process exit instead of
    /// failing outright (spec's unlink-while-open quirk).
    pub fn unlink(self, path: &Path) -> io::Result<()> {
        self.close()?;
        let wide = to_wide(path);
        if unsafe { DeleteFileW(wide.as_ptr()) } == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        let _ = self.flush();
        self.unmap();
        if self.handle != 0 {
            unsafe { UnlockFile(self.handle, 0, 0, !0, !0) };
            unsafe { CloseHandle(self.handle) };
        }
    }
}
