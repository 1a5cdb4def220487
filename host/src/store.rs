// Document store: the persistence and notification collaborator.
//
// Collections of schemaless JSON documents keyed by id. Besides
// put/get/delete, every collection exposes a live feed of full snapshots
// (`subscribe`), which is how lobbies and opponents learn about changes.
// `MemoryStore` is the in-process implementation used by the simulator and
// the tests; it can be told to fail requests to exercise retry paths.
// Writes are unconditional, so a store has exactly one writing coordinator.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::StoreError;

pub type Document = serde_json::Value;

/// Full contents of one collection at some point in time.
pub type Snapshot = Arc<BTreeMap<String, Document>>;

pub trait DocumentStore: Send + Sync + 'static {
    fn put(&self, collection: &str, id: &str, doc: Document) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn get(&self, collection: &str, id: &str) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send;

    /// Deleting a missing document is not an error.
    fn delete(&self, collection: &str, id: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Live feed of `collection`. The receiver starts at the current
    /// snapshot and is notified on every change.
    fn subscribe(&self, collection: &str) -> watch::Receiver<Snapshot>;
}

#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, watch::Sender<Snapshot>>,
    failing_puts: AtomicUsize,
    lost_acks: AtomicUsize,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` puts fail with `Unavailable` without writing.
    pub fn fail_next_puts(&self, n: usize) {
        self.failing_puts.store(n, Ordering::SeqCst);
    }

    /// The next `n` puts are written but report `Timeout`, as if the
    /// acknowledgement was lost on the way back.
    pub fn lose_next_acks(&self, n: usize) {
        self.lost_acks.store(n, Ordering::SeqCst);
    }

    /// While offline every request fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of documents currently stored in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        match self.collections.get(collection) {
            Some(tx) => {
                let count = tx.borrow().len();
                count
            }
            None => 0,
        }
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("store is offline".into()))
        } else {
            Ok(())
        }
    }

    // Decrement `counter` if positive; true when a fault should fire.
    fn take_fault(counter: &AtomicUsize) -> bool {
        counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
    }

    fn with_collection<T>(&self, collection: &str, f: impl FnOnce(&watch::Sender<Snapshot>) -> T) -> T {
        let sender = self
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| watch::channel(Snapshot::default()).0);
        f(&sender)
    }
}

impl DocumentStore for MemoryStore {
    async fn put(&self, collection: &str, id: &str, doc: Document) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        self.check_online()?;
        if Self::take_fault(&self.failing_puts) {
            warn!(collection, id, "injected put failure");
            return Err(StoreError::Unavailable("injected put failure".into()));
        }
        self.with_collection(collection, |tx| {
            tx.send_modify(|snapshot| {
                Arc::make_mut(snapshot).insert(id.to_string(), doc);
            })
        });
        debug!(collection, id, "document written");
        if Self::take_fault(&self.lost_acks) {
            warn!(collection, id, "injected lost acknowledgement");
            return Err(StoreError::Timeout(Duration::ZERO));
        }
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        tokio::task::yield_now().await;
        self.check_online()?;
        let Some(tx) = self.collections.get(collection) else {
            return Ok(None);
        };
        let doc = tx.borrow().get(id).cloned();
        Ok(doc)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        self.check_online()?;
        self.with_collection(collection, |tx| {
            tx.send_if_modified(|snapshot| {
                if snapshot.contains_key(id) {
                    Arc::make_mut(snapshot).remove(id);
                    true
                } else {
                    false
                }
            })
        });
        debug!(collection, id, "document deleted");
        Ok(())
    }

    fn subscribe(&self, collection: &str) -> watch::Receiver<Snapshot> {
        self.with_collection(collection, |tx| tx.subscribe())
    }
}

/// Timeout and retry settings applied to every store request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Run `op` under the request timeout, retrying retryable failures up
    /// to `max_retries` times with linear backoff. Only use this for
    /// requests that are safe to repeat.
    pub async fn run<T, F, Fut>(&self, what: &'static str, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0;
        loop {
            match self.once(op()).await {
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(what, attempt, error = %err, "store request failed, retrying");
                    self.pause(attempt).await;
                }
                other => return other,
            }
        }
    }

    /// A single attempt under the request timeout.
    pub async fn once<T>(&self, fut: impl Future<Output = Result<T, StoreError>>) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }

    pub async fn pause(&self, attempt: u32) {
        tokio::time::sleep(self.backoff.saturating_mul(attempt)).await;
    }
}
