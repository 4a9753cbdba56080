// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 chainqueue contributors

use std::path::PathBuf;

/// Errors surfaced by the queue engine and the blocking wrapper.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Another open queue already holds the head file's lock.
    #[error("queue at {path:?} is already open")]
    AlreadyOpen { path: PathBuf },

    /// `chunk_size` failed the construction-time bounds check.
    #[error("invalid chunk size {chunk_size}: {reason}")]
    InvalidChunkSize { chunk_size: u64, reason: &'static str },

    /// The payload exceeds `max_element_size()` for this queue.
    #[error("payload of {length} bytes exceeds the {max}-byte maximum element size")]
    PayloadTooLarge { length: usize, max: usize },

    /// A cycle was detected in the on-disk chunk chain, or a referenced
    /// chunk file was unreadable or shorter than its header.
    #[error("corrupt chunk chain at {path:?}: {reason}")]
    CorruptChain { path: PathBuf, reason: &'static str },

    /// A blocking-wrapper wait was cancelled by the host before it resolved.
    #[error("wait was cancelled")]
    Cancelled,

    /// `dequeue_if`'s predicate panicked; the element was left in place.
    #[error("predicate panicked; element was not removed")]
    PredicateFailure,

    /// Underlying filesystem or memory-mapping failure.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
