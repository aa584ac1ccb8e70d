//! Learning Buffer: a bounded, single-consumer queue carrying observed
//! transactions from the hot request path to the Consolidator.
//!
//! Enqueue is non-blocking and O(1): on a full queue the oldest entry is
//! dropped and a counter incremented, rather than applying backpressure
//! to the request path.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Notify;

/// Default queue capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

/// A shutdown signal the Consolidator can both poll and wait on: `Notify`
/// alone can't answer "has shutdown already happened", which the drain loop
/// needs to decide when it's safe to stop.
#[derive(Default)]
pub struct Shutdown {
    triggered: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self { triggered: AtomicBool::new(false), notify: Notify::new() }
    }

    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// One observed HTTP transaction, queued for consolidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub latency_ms: u64,
    pub req_headers: Vec<(String, String)>,
    pub req_body: Option<Value>,
    pub resp_headers: Vec<(String, String)>,
    pub resp_body: Option<Value>,
    pub timestamp_ms: i64,
    pub mocked: bool,
    pub chaos: bool,
}

/// A bounded, drop-oldest FIFO queue shared between the hot request path
/// (producer) and the Consolidator (single consumer).
pub struct LearningBuffer {
    inner: Mutex<VecDeque<Transaction>>,
    capacity: usize,
    dropped: AtomicU64,
    notify: Notify,
}

impl LearningBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            dropped: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    /// Non-blocking enqueue. On a full queue, drops the oldest entry and
    /// increments the dropped-counter metric before pushing the new one.
    pub fn enqueue(&self, transaction: Transaction) {
        let mut queue = self.inner.lock();
        if queue.len() >= self.capacity {
            queue.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        queue.push_back(transaction);
        drop(queue);
        self.notify.notify_one();
    }

    /// Drain at most `max` transactions in FIFO order without blocking.
    pub fn drain(&self, max: usize) -> Vec<Transaction> {
        let mut queue = self.inner.lock();
        let n = max.min(queue.len());
        queue.drain(..n).collect()
    }

    /// Block until at least one transaction is available or `shutdown`
    /// fires, then drain everything currently queued. Used by the
    /// Consolidator's blocking dequeue suspension point.
    pub async fn dequeue_batch(&self, shutdown: &Shutdown) -> Vec<Transaction> {
        loop {
            {
                let mut queue = self.inner.lock();
                if !queue.is_empty() {
                    return queue.drain(..).collect();
                }
            }
            if shutdown.is_triggered() {
                return Vec::new();
            }
            tokio::select! {
                () = self.notify.notified() => {}
                () = shutdown.notified() => {}
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for LearningBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txn(path: &str) -> Transaction {
        Transaction {
            method: "GET".to_string(),
            path: path.to_string(),
            status: 200,
            latency_ms: 5,
            req_headers: Vec::new(),
            req_body: None,
            resp_headers: Vec::new(),
            resp_body: None,
            timestamp_ms: 0,
            mocked: false,
            chaos: false,
        }
    }

    #[test]
    fn enqueue_and_drain_preserves_fifo_order() {
        let buffer = LearningBuffer::new(10);
        buffer.enqueue(txn("/a"));
        buffer.enqueue(txn("/b"));
        let drained = buffer.drain(10);
        assert_eq!(drained[0].path, "/a");
        assert_eq!(drained[1].path, "/b");
    }

    #[test]
    fn overflow_drops_oldest_and_counts_it() {
        let buffer = LearningBuffer::new(2);
        buffer.enqueue(txn("/a"));
        buffer.enqueue(txn("/b"));
        buffer.enqueue(txn("/c"));
        assert_eq!(buffer.dropped_count(), 1);
        let drained = buffer.drain(10);
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].path, "/b");
        assert_eq!(drained[1].path, "/c");
    }

    #[test]
    fn drain_respects_max() {
        let buffer = LearningBuffer::new(10);
        for i in 0..5 {
            buffer.enqueue(txn(&format!("/{i}")));
        }
        let drained = buffer.drain(3);
        assert_eq!(drained.len(), 3);
        assert_eq!(buffer.len(), 2);
    }

    #[tokio::test]
    async fn dequeue_batch_wakes_on_enqueue() {
        let buffer = LearningBuffer::new(10);
        let shutdown = Shutdown::new();
        buffer.enqueue(txn("/a"));
        let drained = buffer.dequeue_batch(&shutdown).await;
        assert_eq!(drained.len(), 1);
    }

    #[tokio::test]
    async fn dequeue_batch_returns_on_shutdown_even_when_empty() {
        let buffer = LearningBuffer::new(10);
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let drained = buffer.dequeue_batch(&shutdown).await;
        assert!(drained.is_empty());
    }
}
