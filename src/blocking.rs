// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 chainqueue contributors
//
// A blocking wrapper around `Queue`: one guard, one "non-empty" condition
// signal, and a cancellation flag checked on every wake — the same shape as
// a named waiter with a quit flag, adapted to in-process `Mutex`/`Condvar`
// since this queue never crosses a process boundary.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::queue::Queue;

/// A `Queue` behind a guard, with blocking `poll`/`peek`/`dequeue` built on
/// a condition variable signalled once per successful `enqueue`.
pub struct BlockingQueue {
    inner: Mutex<Queue>,
    non_empty: Condvar,
    cancelled: AtomicBool,
}

impl BlockingQueue {
    /// Open (or create) the queue at `path` and wrap it for blocking access.
    pub fn open(path: impl AsRef<Path>, chunk_size: u64) -> Result<Self> {
        let queue = Queue::open(path, chunk_size)?;
        Ok(Self {
            inner: Mutex::new(queue),
            non_empty: Condvar::new(),
            cancelled: AtomicBool::new(false),
        })
    }

    /// Append `payload`, then wake one waiter.
    pub fn enqueue(&self, payload: &[u8]) -> Result<()> {
        {
            let mut queue = self.inner.lock().expect("queue mutex poisoned");
            queue.enqueue(payload)?;
        }
        self.non_empty.notify_one();
        Ok(())
    }

    /// Block until the queue is non-empty or `timeout` elapses.
    ///
    /// Returns `Ok(true)` if the queue is non-empty on return, `Ok(false)`
    /// on timeout, or `Err(Error::Cancelled)` if `cancel()` was called while
    /// waiting.
    pub fn poll(&self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.inner.lock().expect("queue mutex poisoned");
        while queue.is_empty() {
            if self.cancelled.load(Ordering::Acquire) {
                return Err(Error::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            let (guard, result) = self
                .non_empty
                .wait_timeout(queue, deadline - now)
                .expect("queue mutex poisoned");
            queue = guard;
            if result.timed_out() && queue.is_empty() {
                if self.cancelled.load(Ordering::Acquire) {
                    return Err(Error::Cancelled);
                }
                return Ok(false);
            }
            // Spurious wake or real signal: loop re-checks `is_empty`.
        }
        Ok(true)
    }

    /// `poll`, then return (without removing) the head entry.
    pub fn peek(&self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        if !self.poll(timeout)? {
            return Ok(None);
        }
        let mut queue = self.inner.lock().expect("queue mutex poisoned");
        Ok(queue.peek())
    }

    /// `poll`, then remove the head entry.
    pub fn dequeue(&self, timeout: Duration) -> Result<bool> {
        if !self.poll(timeout)? {
            return Ok(false);
        }
        let mut queue = self.inner.lock().expect("queue mutex poisoned");
        queue.dequeue()
    }

    /// `poll`, then remove and return the head entry only if `predicate`
    /// returns `true` for it. If `predicate` panics, the element is left in
    /// place and `Error::PredicateFailure` is returned.
    pub fn dequeue_if<F>(&self, timeout: Duration, predicate: F) -> Result<Option<Vec<u8>>>
    where
        F: Fn(&[u8]) -> bool,
    {
        if !self.poll(timeout)? {
            return Ok(None);
        }
        let mut queue = self.inner.lock().expect("queue mutex poisoned");
        let Some(element) = queue.peek() else {
            return Ok(None);
        };
        match catch_unwind(AssertUnwindSafe(|| predicate(&element))) {
            Ok(true) => {
                queue.dequeue()?;
                Ok(Some(element))
            }
            Ok(false) => Ok(None),
            Err(_) => Err(Error::PredicateFailure),
        }
    }

    /// Signal every current and future waiter to return `Cancelled`.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.non_empty.notify_all();
    }

    /// Close the underlying queue.
    pub fn close(self) -> Result<()> {
        self.inner.into_inner().expect("queue mutex poisoned").close()
    }
}
