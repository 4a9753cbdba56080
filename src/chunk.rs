// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 chainqueue contributors
//
// One chunk file: header (head-ptr, tail-ptr, next) followed by a
// contiguous run of framed entries. `Chunk` owns the path, the exclusive
// lock, the mapped region, and the cached header fields.

use std::path::{Path, PathBuf};

use tracing::trace;

use crate::codec::{get_u16, get_u32, put_u16, put_u32};
use crate::error::{Error, Result};
use crate::platform::LockedFile;

/// Bytes used by a chunk reference (`next`, and the `first` field in the
/// head file).
pub const REF_SIZE: usize = 2;
/// Bytes used by a pointer field (`head-ptr`, `tail-ptr`).
pub const PTR_SIZE: usize = 4;
/// Bytes used by an entry's length prefix.
pub const ENTRY_HEADER_SIZE: usize = 2;
/// Bytes used by a chunk's fixed header: `head-ptr` + `tail-ptr` + `next`.
pub const CHUNK_HEADER_SIZE: usize = PTR_SIZE + PTR_SIZE + REF_SIZE;
/// The distinguished "no chunk" reference.
pub const NULL_REF: u16 = 0;
/// Largest valid chunk id; `0` is reserved for `NULL_REF`.
pub const MAX_ID: u32 = 65535;
/// Largest chunk size this format can express (a `u32` pointer width).
pub const MAX_CHUNK_SIZE: u64 = u32::MAX as u64;

const HEAD_PTR_OFFSET: usize = 0;
const TAIL_PTR_OFFSET: usize = PTR_SIZE;
const NEXT_OFFSET: usize = PTR_SIZE + PTR_SIZE;

/// A single chunk file: fixed-size header plus a run of `(length, bytes)`
/// entries from `head_ptr` up to (not including) `tail_ptr`.
pub(crate) struct Chunk {
    path: PathBuf,
    id: u16,
    chunk_size: usize,
    file: LockedFile,
    head_ptr: u32,
    tail_ptr: u32,
    next: u16,
}

impl Chunk {
    /// Open (or create) the chunk file at `path` for chunk `id`.
    ///
    /// `force_new` truncates and re-initialises the header even if the file
    /// already existed. A chunk file shorter than `CHUNK_HEADER_SIZE` is
    /// always treated as fresh, matching spec for chunks referenced by a
    /// chain whose file somehow predates initialization.
    pub fn open(path: &Path, id: u16, chunk_size: usize, force_new: bool) -> Result<Self> {
        let mut file = LockedFile::open(path, true).map_err(|e| {
            if e.kind() == std::io::ErrorKind::WouldBlock {
                Error::AlreadyOpen { path: path.to_path_buf() }
            } else {
                Error::Io(e)
            }
        })?;

        let existing_len = file.file_len()?;
        let treat_as_fresh = force_new || existing_len < CHUNK_HEADER_SIZE as u64;

        file.set_len_and_map(chunk_size)?;

        let mut chunk = Self {
            path: path.to_path_buf(),
            id,
            chunk_size,
            file,
            head_ptr: CHUNK_HEADER_SIZE as u32,
            tail_ptr: CHUNK_HEADER_SIZE as u32,
            next: NULL_REF,
        };

        if treat_as_fresh {
            chunk.write_header();
            chunk.force()?;
            trace!(id, ?path, "chunk initialised fresh");
        } else {
            let bytes = chunk.file.as_slice();
            chunk.head_ptr = get_u32(bytes, HEAD_PTR_OFFSET);
            chunk.tail_ptr = get_u32(bytes, TAIL_PTR_OFFSET);
            chunk.next = get_u16(bytes, NEXT_OFFSET);
            trace!(id, ?path, head = chunk.head_ptr, tail = chunk.tail_ptr, next = chunk.next, "chunk opened");
        }

        Ok(chunk)
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn next(&self) -> u16 {
        self.next
    }

    pub fn head_ptr(&self) -> u32 {
        self.head_ptr
    }

    pub fn tail_ptr(&self) -> u32 {
        self.tail_ptr
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `true` iff this chunk's entry region is empty (`head_ptr >= tail_ptr`).
    pub fn is_drained(&self) -> bool {
        self.head_ptr >= self.tail_ptr
    }

    /// Length prefix of the entry at `head_ptr`.
    pub fn peek_length(&self) -> u16 {
        get_u16(self.file.as_slice(), self.head_ptr as usize)
    }

    /// Copy the payload of the entry at `head_ptr` into `buffer`. The caller
    /// must have sized `buffer` using `peek_length`.
    pub fn peek_into(&self, buffer: &mut [u8]) {
        let start = self.head_ptr as usize + ENTRY_HEADER_SIZE;
        buffer.copy_from_slice(&self.file.as_slice()[start..start + buffer.len()]);
    }

    /// Append one entry (`length` prefix + `payload[offset..offset+length]`)
    /// at `tail_ptr`. The caller must have already checked that it fits.
    pub fn append(&mut self, payload: &[u8], offset: usize, length: usize) {
        let start = self.tail_ptr as usize;
        let bytes = self.file.as_mut_slice();
        put_u16(bytes, start, length as u16);
        bytes[start + ENTRY_HEADER_SIZE..start + ENTRY_HEADER_SIZE + length]
            .copy_from_slice(&payload[offset..offset + length]);
        self.tail_ptr = (start + ENTRY_HEADER_SIZE + length) as u32;
    }

    /// Advance `head_ptr` past one entry of length `length`.
    pub fn advance_head(&mut self, length: u16) {
        self.head_ptr += ENTRY_HEADER_SIZE as u32 + length as u32;
    }

    /// Reset this chunk in place: `head_ptr = tail_ptr = CHUNK_HEADER_SIZE`,
    /// `next = NULL_REF`.
    pub fn reset(&mut self) {
        self.head_ptr = CHUNK_HEADER_SIZE as u32;
        self.tail_ptr = CHUNK_HEADER_SIZE as u32;
        self.next = NULL_REF;
    }

    pub fn set_next(&mut self, next: u16) {
        self.next = next;
    }

    pub fn write_head_ptr(&mut self) {
        put_u32(self.file.as_mut_slice(), HEAD_PTR_OFFSET, self.head_ptr);
    }

    pub fn write_tail_ptr(&mut self) {
        put_u32(self.file.as_mut_slice(), TAIL_PTR_OFFSET, self.tail_ptr);
    }

    pub fn write_next_ref(&mut self) {
        put_u16(self.file.as_mut_slice(), NEXT_OFFSET, self.next);
    }

    pub fn write_header(&mut self) {
        self.write_head_ptr();
        self.write_tail_ptr();
        self.write_next_ref();
    }

    /// Durability barrier: flush preceding writes on the mapped region.
    pub fn force(&self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    /// How many more bytes (entry header + payload) fit before `tail_ptr`
    /// would exceed `chunk_size`.
    pub fn remaining(&self) -> usize {
        self.chunk_size.saturating_sub(self.tail_ptr as usize)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Flush, release the lock, close the file, and delete it from disk.
    pub fn drop_file(self) -> Result<()> {
        let path = self.path.clone();
        let id = self.id;
        self.file.unlink(&path)?;
        trace!(id, ?path, "chunk file dropped");
        Ok(())
    }

    /// Flush, release the lock, and close the file (no delete).
    pub fn close(self) -> Result<()> {
        self.file.close()?;
        Ok(())
    }
}
