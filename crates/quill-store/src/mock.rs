//! In-memory store implementation for testing.
//!
//! Provides [`MemoryStore`] for exercising store consumers without touching
//! the filesystem, with failure injection, artificial latency, and a call log.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::store::{
    Collection, DocumentStore, Record, RecordPatch, StoreError, StoreErrorKind, StoredRecord,
    Timestamps, sort_newest_first,
};

/// Backend identifier for error messages.
const BACKEND: &str = "Memory";

/// Store operation, used for failure injection and the call log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Create,
    Update,
    Get,
    Delete,
    List,
}

impl StoreOp {
    fn is_write(self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Delete)
    }
}

/// A recorded store call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreCall {
    /// Operation invoked.
    pub op: StoreOp,
    /// Target collection.
    pub collection: Collection,
    /// Target id (`None` for create and list).
    pub id: Option<String>,
}

/// Decrements the in-flight write counter on drop.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory store for testing.
///
/// Ids are assigned sequentially per collection (`draft-1`, `post-1`, ...).
///
/// # Example
///
/// ```ignore
/// use quill_store::{Collection, MemoryStore, StoreErrorKind, StoreOp};
///
/// let store = MemoryStore::new()
///     .with_draft("d1", record)
///     .with_write_delay(Duration::from_millis(200));
/// store.fail_next(StoreOp::Update, StoreErrorKind::Unavailable);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(Collection, String), StoredRecord>>,
    next_id: AtomicUsize,
    failures: Mutex<VecDeque<(StoreOp, StoreErrorKind)>>,
    failing: RwLock<HashMap<StoreOp, StoreErrorKind>>,
    write_delay: RwLock<Duration>,
    calls: Mutex<Vec<StoreCall>>,
    in_flight_writes: AtomicUsize,
    max_in_flight_writes: AtomicUsize,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a draft with the given id.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_draft(self, id: impl Into<String>, record: Record) -> Self {
        self.insert(Collection::Drafts, id.into(), record);
        self
    }

    /// Seed a post with the given id.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_post(self, id: impl Into<String>, record: Record) -> Self {
        self.insert(Collection::Posts, id.into(), record);
        self
    }

    /// Delay every write (create, update, delete) by `delay`.
    #[must_use]
    pub fn with_write_delay(self, delay: Duration) -> Self {
        self.set_write_delay(delay);
        self
    }

    /// Change the write delay.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.write().unwrap() = delay;
    }

    /// Fail the next call of `op` with `kind`. Queued failures are consumed in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn fail_next(&self, op: StoreOp, kind: StoreErrorKind) {
        self.failures.lock().unwrap().push_back((op, kind));
    }

    /// Fail every call of `op` with `kind` until [`Self::clear_failures`].
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn fail_always(&self, op: StoreOp, kind: StoreErrorKind) {
        self.failing.write().unwrap().insert(op, kind);
    }

    /// Remove all queued and persistent failures.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
        self.failing.write().unwrap().clear();
    }

    /// Every call made so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls of `op` against `collection`.
    #[must_use]
    pub fn call_count(&self, op: StoreOp, collection: Collection) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.op == op && c.collection == collection)
            .count()
    }

    /// Total number of write calls (create, update, delete) made.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.calls().iter().filter(|c| c.op.is_write()).count()
    }

    /// Highest number of writes observed in flight at the same time.
    #[must_use]
    pub fn max_concurrent_writes(&self) -> usize {
        self.max_in_flight_writes.load(Ordering::SeqCst)
    }

    /// Snapshot of a stored record, bypassing failure injection and the call log.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn record(&self, collection: Collection, id: &str) -> Option<StoredRecord> {
        self.records
            .read()
            .unwrap()
            .get(&(collection, id.to_owned()))
            .cloned()
    }

    /// Number of records in `collection`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn len(&self, collection: Collection) -> usize {
        self.records
            .read()
            .unwrap()
            .keys()
            .filter(|(c, _)| *c == collection)
            .count()
    }

    /// Returns `true` if both collections are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len(Collection::Drafts) == 0 && self.len(Collection::Posts) == 0
    }

    fn insert(&self, collection: Collection, id: String, record: Record) {
        let stored = StoredRecord {
            id: id.clone(),
            record,
            timestamps: Timestamps::on_create(collection, Utc::now()),
        };
        self.records
            .write()
            .unwrap()
            .insert((collection, id), stored);
    }

    /// Log the call and return an injected failure, if any.
    fn enter(&self, op: StoreOp, collection: Collection, id: Option<&str>) -> Result<(), StoreError> {
        self.calls.lock().unwrap().push(StoreCall {
            op,
            collection,
            id: id.map(str::to_owned),
        });

        let queued = {
            let mut failures = self.failures.lock().unwrap();
            failures
                .iter()
                .position(|(o, _)| *o == op)
                .and_then(|idx| failures.remove(idx))
                .map(|(_, kind)| kind)
        };
        let kind = queued.or_else(|| self.failing.read().unwrap().get(&op).copied());

        match kind {
            Some(kind) => {
                let err = StoreError::new(kind)
                    .with_collection(collection)
                    .with_backend(BACKEND);
                Err(match id {
                    Some(id) => err.with_record(collection, id),
                    None => err,
                })
            }
            None => Ok(()),
        }
    }

    /// Track a write in flight and apply the configured delay.
    async fn begin_write(&self) -> InFlight<'_> {
        let now = self.in_flight_writes.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight_writes.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight_writes);

        let delay = *self.write_delay.read().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        guard
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: Collection, record: Record) -> Result<String, StoreError> {
        let _in_flight = self.begin_write().await;
        self.enter(StoreOp::Create, collection, None)?;

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = match collection {
            Collection::Drafts => format!("draft-{n}"),
            Collection::Posts => format!("post-{n}"),
        };
        self.insert(collection, id.clone(), record);
        Ok(id)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: RecordPatch,
    ) -> Result<(), StoreError> {
        let _in_flight = self.begin_write().await;
        self.enter(StoreOp::Update, collection, Some(id))?;

        let mut records = self.records.write().unwrap();
        let stored = records
            .get_mut(&(collection, id.to_owned()))
            .ok_or_else(|| StoreError::not_found(collection, id).with_backend(BACKEND))?;
        patch.apply_to(&mut stored.record);
        stored.timestamps.touch(collection, Utc::now());
        Ok(())
    }

    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<StoredRecord>, StoreError> {
        self.enter(StoreOp::Get, collection, Some(id))?;
        Ok(self.record(collection, id))
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let _in_flight = self.begin_write().await;
        self.enter(StoreOp::Delete, collection, Some(id))?;

        self.records
            .write()
            .unwrap()
            .remove(&(collection, id.to_owned()));
        Ok(())
    }

    async fn list(&self, collection: Collection) -> Result<Vec<StoredRecord>, StoreError> {
        self.enter(StoreOp::List, collection, None)?;

        let mut records: Vec<_> = self
            .records
            .read()
            .unwrap()
            .iter()
            .filter(|((c, _), _)| *c == collection)
            .map(|(_, stored)| stored.clone())
            .collect();
        sort_newest_first(collection, &mut records);
        Ok(records)
    }
}
