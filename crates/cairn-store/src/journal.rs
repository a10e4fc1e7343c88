//! # Journal — Deferred Write Backlog
//!
//! Names of blocks that sit in a store's cache but have not reached its
//! backing medium. Appends come from any thread at any time; draining is
//! serialized by a separate flush lock held for the whole drain.
//!
//! ## Ordering Guarantee
//!
//! At most one flush drains a journal at a time, in FIFO order. Appends
//! never wait for a drain: the queue lock is held only for the push or pop
//! itself, never across backend I/O. Names appended while a drain is
//! running are picked up by that same drain.

use std::collections::VecDeque;

use parking_lot::{Mutex, MutexGuard};

/// FIFO of block names awaiting a backing-store write.
#[derive(Debug, Default)]
pub struct Journal {
    queue: Mutex<VecDeque<String>>,
    flush: Mutex<()>,
}

impl Journal {
    /// Create an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `name` for the next flush.
    pub fn append(&self, name: impl Into<String>) {
        let name = name.into();
        tracing::debug!(name = %name, "journal append");
        self.queue.lock().push_back(name);
    }

    /// Number of names awaiting flush.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether nothing awaits flush.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// A copy of the pending names, oldest first.
    pub fn pending(&self) -> Vec<String> {
        self.queue.lock().iter().cloned().collect()
    }

    /// Take the exclusive drain lock.
    pub(crate) fn begin_flush(&self) -> MutexGuard<'_, ()> {
        self.flush.lock()
    }

    pub(crate) fn pop_front(&self) -> Option<String> {
        self.queue.lock().pop_front()
    }

    /// Put a name back at the head after a failed write so the next flush
    /// retries it first.
    pub(crate) fn requeue(&self, name: String) {
        self.queue.lock().push_front(name);
    }
}
