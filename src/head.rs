// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 chainqueue contributors
//
// The head file: a single `u16` recording the id of the first chunk in the
// chain (`NULL_REF` for an empty queue).

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::codec::{get_u16, put_u16};
use crate::error::{Error, Result};
use crate::platform::LockedFile;

/// Size in bytes of the head file: one `u16` field, `first`.
pub const QUEUE_HEAD_SIZE: usize = 2;

/// Owns the head-pointer file: path, exclusive lock, mapped region, and the
/// cached `first` chunk reference.
pub(crate) struct Head {
    path: PathBuf,
    file: LockedFile,
    first: u16,
}

impl Head {
    /// Open (creating if missing) the head file at `path`, take its
    /// exclusive lock, and read `first`.
    ///
    /// Fails with `Error::AlreadyOpen` if another process already holds the
    /// lock.
    pub fn open(path: &Path) -> Result<Self> {
        let path = path
            .canonicalize()
            .or_else(|_| std::env::current_dir().map(|d| d.join(path)))?;

        let mut file = LockedFile::open(&path, true).map_err(|e| {
            if e.kind() == std::io::ErrorKind::WouldBlock {
                Error::AlreadyOpen { path: path.clone() }
            } else {
                Error::Io(e)
            }
        })?;

        file.set_len_and_map(QUEUE_HEAD_SIZE)?;
        let first = get_u16(file.as_slice(), 0);
        trace!(?path, first, "head opened");

        Ok(Self { path, file, first })
    }

    pub fn first(&self) -> u16 {
        self.first
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably persist a new `first` value.
    pub fn write_first(&mut self, value: u16) -> Result<()> {
        put_u16(self.file.as_mut_slice(), 0, value);
        self.file.flush()?;
        self.first = value;
        debug!(path = ?self.path, first = value, "head.first updated");
        Ok(())
    }

    /// Release the lock and close the file, leaving it on disk.
    pub fn close(self) -> Result<()> {
        self.file.close()?;
        Ok(())
    }

    /// Close and delete the head file.
    pub fn unlink(self) -> Result<()> {
        let path = self.path.clone();
        self.file.unlink(&path)?;
        Ok(())
    }
}
