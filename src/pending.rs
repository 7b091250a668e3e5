//! Request sequencing and response correlation.
//!
//! Every outstanding request is one entry in the pending table: the id
//! issued by the sequencer maps to a one-shot channel the submitting
//! caller waits on. A reader task delivering a response removes the
//! entry, so each id sees at most one delivery; a caller timing out
//! removes its own entry, so a late response is dropped instead of
//! mis-delivered.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{oneshot, Mutex};

/// Sole source of request identifiers: strictly increasing, starting
/// at 1, never reused for the process lifetime. Also the connection
/// selection key (`id % pool_size`).
#[derive(Debug, Default)]
pub(crate) struct RequestSequencer {
    next: AtomicU64,
}

impl RequestSequencer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Table of in-flight requests awaiting correlation.
///
/// The lock is held only for O(1) map operations, never across I/O.
#[derive(Default)]
pub(crate) struct PendingRequests {
    inner: Mutex<HashMap<u64, oneshot::Sender<String>>>,
}

impl PendingRequests {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `id` and return its delivery channel.
    pub(crate) async fn register(&self, id: u64) -> oneshot::Receiver<String> {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().await.insert(id, tx);
        rx
    }

    /// Deliver `payload` to the waiter registered for `id`, removing the
    /// entry. Returns false when no waiter exists (already timed out or
    /// unknown id) — the payload is dropped in that case.
    pub(crate) async fn deliver(&self, id: u64, payload: String) -> bool {
        let waiter = self.inner.lock().await.remove(&id);
        match waiter {
            Some(tx) => tx.send(payload).is_ok(),
            None => false,
        }
    }

    /// Remove an entry without delivering. Used by callers on timeout.
    pub(crate) async fn cancel(&self, id: u64) {
        self.inner.lock().await.remove(&id);
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
