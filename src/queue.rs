// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 chainqueue contributors
//
// The queue engine: one `Head` plus an ordered, in-memory list of open
// `Chunk`s. Every cross-file invariant from the on-disk format lives here —
// `Head`/`Chunk` only know how to manage their own file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::chunk::{Chunk, CHUNK_HEADER_SIZE, ENTRY_HEADER_SIZE, MAX_CHUNK_SIZE, MAX_ID, NULL_REF};
use crate::error::{Error, Result};
use crate::head::Head;

/// A durable, single-process FIFO byte queue backed by a chain of fixed-size
/// files on disk.
pub struct Queue {
    path: PathBuf,
    chunk_size: usize,
    head: Option<Head>,
    chunks: Vec<Chunk>,
    cached_head_entry_length: Option<u16>,
}

impl Queue {
    /// Open (or create) the queue rooted at `path`, using `chunk_size`-byte
    /// chunk files.
    pub fn open(path: impl AsRef<Path>, chunk_size: u64) -> Result<Self> {
        let min_chunk_size = (CHUNK_HEADER_SIZE + ENTRY_HEADER_SIZE) as u64;
        if chunk_size > MAX_CHUNK_SIZE {
            return Err(Error::InvalidChunkSize {
                chunk_size,
                reason: "exceeds the 32-bit pointer width this format supports",
            });
        }
        if chunk_size <= min_chunk_size {
            return Err(Error::InvalidChunkSize {
                chunk_size,
                reason: "must be greater than CHUNK_HEADER_SIZE + ENTRY_HEADER_SIZE",
            });
        }

        let head = Head::open(path.as_ref())?;
        let base_path = head.path().to_path_buf();

        let mut chunks = Vec::new();
        let mut visited = HashSet::new();
        let mut next = head.first();
        while next != NULL_REF {
            if !visited.insert(next) {
                return Err(Error::CorruptChain {
                    path: base_path,
                    reason: "cycle detected while traversing the chunk chain",
                });
            }
            let chunk_path = resolve_chunk_path(&base_path, next);
            let chunk = Chunk::open(&chunk_path, next, chunk_size as usize, false)?;
            next = chunk.next();
            chunks.push(chunk);
        }

        debug!(path = ?base_path, chunks = chunks.len(), "queue opened");

        Ok(Self {
            path: base_path,
            chunk_size: chunk_size as usize,
            head: Some(head),
            chunks,
            cached_head_entry_length: None,
        })
    }

    /// The largest payload `enqueue` will accept.
    pub fn max_element_size(&self) -> usize {
        self.chunk_size - CHUNK_HEADER_SIZE - ENTRY_HEADER_SIZE
    }

    /// `true` iff the chunk list is empty, or it has exactly one chunk whose
    /// entry region is drained. Never performs I/O.
    pub fn is_empty(&self) -> bool {
        match self.chunks.as_slice() {
            [] => true,
            [only] => only.is_drained(),
            _ => false,
        }
    }

    /// Return (without removing) the entry at the head of the queue.
    pub fn peek(&mut self) -> Option<Vec<u8>> {
        if self.is_empty() {
            return None;
        }
        let front = &self.chunks[0];
        let length = front.peek_length();
        self.cached_head_entry_length = Some(length);
        let mut buffer = vec![0u8; length as usize];
        front.peek_into(&mut buffer);
        Some(buffer)
    }

    /// Remove the entry at the head of the queue. Returns `false` if the
    /// queue was already empty.
    pub fn dequeue(&mut self) -> Result<bool> {
        if self.is_empty() {
            return Ok(false);
        }

        let length = self
            .cached_head_entry_length
            .take()
            .unwrap_or_else(|| self.chunks[0].peek_length());
        self.chunks[0].advance_head(length);

        if !self.chunks[0].is_drained() {
            self.chunks[0].write_head_ptr();
            self.chunks[0].force()?;
            return Ok(true);
        }

        if self.chunks.len() == 1 {
            self.chunks[0].reset();
            self.chunks[0].write_header();
            self.chunks[0].force()?;
            trace!(path = ?self.path, "sole chunk drained and reset in place");
            return Ok(true);
        }

        // More than one chunk: rotate the drained front out. Head.first must
        // be persisted before the old chunk's file is unlinked so a crash
        // mid-rotation always leaves a recoverable state.
        let new_first = self.chunks[0].next();
        self.head.as_mut().expect("queue is open").write_first(new_first)?;
        let removed = self.chunks.remove(0);
        let removed_id = removed.id();
        removed.drop_file()?;
        debug!(path = ?self.path, removed_id, new_first, "chunk rotated out");

        Ok(true)
    }

    /// Append `payload` to the tail of the queue.
    pub fn enqueue(&mut self, payload: &[u8]) -> Result<()> {
        self.enqueue_slice(payload, 0, payload.len())
    }

    /// Append `payload[offset..offset+length]` to the tail of the queue.
    pub fn enqueue_slice(&mut self, payload: &[u8], offset: usize, length: usize) -> Result<()> {
        let max = self.max_element_size();
        if length > max {
            return Err(Error::PayloadTooLarge { length, max });
        }

        if self.chunks.is_empty() {
            let chunk_path = resolve_chunk_path(&self.path, 1);
            let mut chunk = Chunk::open(&chunk_path, 1, self.chunk_size, true)?;
            self.head.as_mut().expect("queue is open").write_first(1)?;
            chunk.append(payload, offset, length);
            chunk.write_header();
            chunk.force()?;
            self.cached_head_entry_length = Some(length as u16);
            self.chunks.push(chunk);
            trace!(path = ?self.path, "first chunk allocated");
            return Ok(());
        }

        let mut newly_allocated = false;
        let needed = ENTRY_HEADER_SIZE + length;
        if self.chunks.last().expect("non-empty").remaining() < needed {
            let cur_id = self.chunks.last().unwrap().id();
            let next_id = next_chunk_id(cur_id);
            let new_path = resolve_chunk_path(&self.path, next_id);
            let new_chunk = Chunk::open(&new_path, next_id, self.chunk_size, true)?;

            let last = self.chunks.last_mut().unwrap();
            last.set_next(next_id);
            last.write_next_ref();
            last.force()?;

            self.chunks.push(new_chunk);
            newly_allocated = true;
            debug!(path = ?self.path, next_id, "tail chunk rotated");
        }

        let tail = self.chunks.last_mut().expect("non-empty");
        tail.append(payload, offset, length);
        if newly_allocated {
            tail.write_header();
        } else {
            tail.write_tail_ptr();
        }
        tail.force()?;

        Ok(())
    }

    /// Discard every queued entry. Returns `false` if the queue was already
    /// empty.
    pub fn clear(&mut self) -> Result<bool> {
        if self.is_empty() {
            return Ok(false);
        }

        self.head.as_mut().expect("queue is open").write_first(NULL_REF)?;
        self.chunks[0].reset();
        self.chunks[0].write_header();
        self.chunks[0].force()?;

        let rest: Vec<Chunk> = self.chunks.split_off(1);
        for chunk in rest {
            chunk.drop_file()?;
        }
        self.cached_head_entry_length = None;
        debug!(path = ?self.path, "queue cleared");
        Ok(true)
    }

    /// Release every lock. If the queue is empty, also deletes every
    /// remaining chunk file and the head file.
    pub fn close(mut self) -> Result<()> {
        let empty = self.is_empty();
        let chunks = std::mem::take(&mut self.chunks);
        let head = self.head.take();

        if empty {
            for chunk in chunks {
                if let Err(e) = chunk.drop_file() {
                    trace!(error = %e, "close: chunk cleanup failed, continuing");
                }
            }
            if let Some(head) = head {
                return head.unlink();
            }
        } else {
            for chunk in chunks {
                if let Err(e) = chunk.close() {
                    trace!(error = %e, "close: chunk release failed, continuing");
                }
            }
            if let Some(head) = head {
                return head.close();
            }
        }
        Ok(())
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        for chunk in self.chunks.drain(..) {
            let _ = chunk.close();
        }
        if let Some(head) = self.head.take() {
            let _ = head.close();
        }
    }
}

/// `dir/name.<id mod MAX_ID>` for the chunk file belonging to `id`.
fn resolve_chunk_path(head_path: &Path, id: u16) -> PathBuf {
    let suffix = (id as u32) % MAX_ID;
    let name = head_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    head_path.with_file_name(format!("{name}.{suffix}"))
}

/// `(id + 1) mod MAX_ID`, skipping `NULL_REF`.
fn next_chunk_id(id: u16) -> u16 {
    let next = ((id as u32 + 1) % MAX_ID) as u16;
    if next == NULL_REF {
        1
    } else {
        next
    }
}
