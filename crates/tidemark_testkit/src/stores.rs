//! In-memory store implementations and instrumented wrappers.

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tidemark_engine::{
    record_id, BulkUpdate, ChangeStore, CheckpointStore, EngineError, EngineResult, Record,
    RecordStore,
};
use tidemark_ledger::{Change, ChangeKind, Checkpoint};
use uuid::Uuid;

/// An in-memory keyed record store.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<BTreeMap<String, Record>>,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record directly, bypassing any tracking.
    ///
    /// This simulates an out-of-band writer (a foreign connector or a
    /// direct admin write) that mutates the store without firing the
    /// tracked mutation entry points.
    pub fn put_untracked(&self, record: Record) {
        if let Ok(id) = record_id(&record) {
            self.records.write().insert(id, record);
        }
    }

    /// Removes a record directly, bypassing any tracking.
    pub fn remove_untracked(&self, id: &str) {
        self.records.write().remove(id);
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl RecordStore for MemoryRecordStore {
    fn create(&self, mut record: Record) -> EngineResult<String> {
        let map = record
            .as_object_mut()
            .ok_or_else(|| EngineError::store_fatal("record must be a JSON object"))?;
        let id = match map.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                let id = Uuid::new_v4().to_string();
                map.insert("id".into(), Value::String(id.clone()));
                id
            }
        };

        let mut records = self.records.write();
        if records.contains_key(&id) {
            return Err(EngineError::store_fatal(format!("duplicate id {id}")));
        }
        records.insert(id.clone(), record);
        Ok(id)
    }

    fn find_all(&self) -> EngineResult<Vec<Record>> {
        Ok(self.records.read().values().cloned().collect())
    }

    fn find_by_id(&self, id: &str) -> EngineResult<Option<Record>> {
        Ok(self.records.read().get(id).cloned())
    }

    fn update_attributes(&self, id: &str, data: Record) -> EngineResult<Record> {
        let mut records = self.records.write();
        let record = records.get_mut(id).ok_or_else(|| EngineError::UnknownRecord {
            model_id: id.to_string(),
        })?;
        if let (Some(existing), Some(incoming)) = (record.as_object_mut(), data.as_object()) {
            for (key, value) in incoming {
                existing.insert(key.clone(), value.clone());
            }
        }
        Ok(record.clone())
    }

    fn destroy(&self, id: &str) -> EngineResult<()> {
        self.records.write().remove(id);
        Ok(())
    }

    fn bulk_apply(&self, updates: &[BulkUpdate]) -> EngineResult<()> {
        let mut records = self.records.write();
        for update in updates {
            match (&update.kind, &update.data) {
                (ChangeKind::Delete, _) | (_, None) => {
                    records.remove(&update.change.model_id);
                }
                (_, Some(data)) => {
                    records.insert(update.change.model_id.clone(), data.clone());
                }
            }
        }
        Ok(())
    }
}

/// An in-memory change ledger.
#[derive(Debug, Default)]
pub struct MemoryChangeStore {
    rows: RwLock<BTreeMap<String, Change>>,
}

impl MemoryChangeStore {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently held.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns true if the ledger holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl ChangeStore for MemoryChangeStore {
    fn get(&self, model_name: &str, model_id: &str) -> EngineResult<Option<Change>> {
        Ok(self
            .rows
            .read()
            .get(&Change::ledger_id(model_name, model_id))
            .cloned())
    }

    fn put(&self, change: Change) -> EngineResult<()> {
        self.rows.write().insert(change.id.clone(), change);
        Ok(())
    }

    fn delete(&self, model_name: &str, model_id: &str) -> EngineResult<()> {
        self.rows
            .write()
            .remove(&Change::ledger_id(model_name, model_id));
        Ok(())
    }

    fn all_for_model(&self, model_name: &str) -> EngineResult<Vec<Change>> {
        Ok(self
            .rows
            .read()
            .values()
            .filter(|change| change.model_name == model_name)
            .cloned()
            .collect())
    }
}

/// An in-memory singleton checkpoint store.
///
/// One mutex guards the record, so create-if-absent and increment are
/// atomic: concurrent callers never produce two records and never
/// observe the same incremented value.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    record: Mutex<Option<Checkpoint>>,
}

impl MemoryCheckpointStore {
    /// Creates a store with no checkpoint record yet.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self) -> EngineResult<Option<Checkpoint>> {
        Ok(self.record.lock().clone())
    }

    fn init(&self) -> EngineResult<Checkpoint> {
        let mut record = self.record.lock();
        Ok(record.get_or_insert_with(Checkpoint::seed).clone())
    }

    fn increment(&self) -> EngineResult<u64> {
        let mut record = self.record.lock();
        Ok(record.get_or_insert_with(Checkpoint::seed).advance())
    }
}

/// A record store wrapper that counts bulk-apply invocations.
pub struct CountingRecordStore {
    inner: Arc<dyn RecordStore>,
    bulk_applies: AtomicUsize,
}

impl CountingRecordStore {
    /// Wraps a record store.
    pub fn new(inner: Arc<dyn RecordStore>) -> Self {
        Self {
            inner,
            bulk_applies: AtomicUsize::new(0),
        }
    }

    /// Number of bulk-apply calls observed so far.
    pub fn bulk_applies(&self) -> usize {
        self.bulk_applies.load(Ordering::SeqCst)
    }
}

impl RecordStore for CountingRecordStore {
    fn create(&self, record: Record) -> EngineResult<String> {
        self.inner.create(record)
    }

    fn find_all(&self) -> EngineResult<Vec<Record>> {
        self.inner.find_all()
    }

    fn find_by_id(&self, id: &str) -> EngineResult<Option<Record>> {
        self.inner.find_by_id(id)
    }

    fn update_attributes(&self, id: &str, data: Record) -> EngineResult<Record> {
        self.inner.update_attributes(id, data)
    }

    fn destroy(&self, id: &str) -> EngineResult<()> {
        self.inner.destroy(id)
    }

    fn bulk_apply(&self, updates: &[BulkUpdate]) -> EngineResult<()> {
        self.bulk_applies.fetch_add(1, Ordering::SeqCst);
        self.inner.bulk_apply(updates)
    }
}

/// A record store wrapper that fails bulk-apply after N successes.
pub struct FailingRecordStore {
    inner: Arc<dyn RecordStore>,
    allowed: AtomicUsize,
    applied: AtomicUsize,
    bulk_applies: AtomicUsize,
}

impl FailingRecordStore {
    /// Wraps a record store; the first `allowed` bulk-apply calls
    /// succeed and every later one fails with a retryable store error.
    /// Rejected calls do not consume the allowance.
    pub fn new(inner: Arc<dyn RecordStore>, allowed: usize) -> Self {
        Self {
            inner,
            allowed: AtomicUsize::new(allowed),
            applied: AtomicUsize::new(0),
            bulk_applies: AtomicUsize::new(0),
        }
    }

    /// Number of bulk-apply attempts observed so far.
    pub fn attempts(&self) -> usize {
        self.bulk_applies.load(Ordering::SeqCst)
    }

    /// Permits `additional` more bulk-apply calls to succeed, so a test
    /// can clear the injected fault and retry.
    pub fn raise_allowance(&self, additional: usize) {
        self.allowed.fetch_add(additional, Ordering::SeqCst);
    }
}

impl RecordStore for FailingRecordStore {
    fn create(&self, record: Record) -> EngineResult<String> {
        self.inner.create(record)
    }

    fn find_all(&self) -> EngineResult<Vec<Record>> {
        self.inner.find_all()
    }

    fn find_by_id(&self, id: &str) -> EngineResult<Option<Record>> {
        self.inner.find_by_id(id)
    }

    fn update_attributes(&self, id: &str, data: Record) -> EngineResult<Record> {
        self.inner.update_attributes(id, data)
    }

    fn destroy(&self, id: &str) -> EngineResult<()> {
        self.inner.destroy(id)
    }

    fn bulk_apply(&self, updates: &[BulkUpdate]) -> EngineResult<()> {
        self.bulk_applies.fetch_add(1, Ordering::SeqCst);
        if self.applied.load(Ordering::SeqCst) >= self.allowed.load(Ordering::SeqCst) {
            return Err(EngineError::store_retryable("injected bulk-apply failure"));
        }
        self.inner.bulk_apply(updates)?;
        self.applied.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
