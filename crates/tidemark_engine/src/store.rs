//! Store ports consumed by the engine.
//!
//! The engine never implements storage. Each store is an opaque keyed
//! record collection reached through these narrow traits, so concrete
//! connectors and test doubles are substituted via dependency injection
//! at construction time.

use crate::error::{EngineError, EngineResult};
use serde_json::Value;
use tidemark_ledger::{Change, ChangeKind, Checkpoint};

/// An opaque record: a JSON object keyed by a string `id` attribute.
pub type Record = Value;

/// Extracts the string `id` attribute of a record.
pub fn record_id(record: &Record) -> EngineResult<String> {
    record
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(EngineError::MissingId)
}

/// One entry of a bulk-apply batch.
#[derive(Debug, Clone)]
pub struct BulkUpdate {
    /// Kind of mutation to apply.
    pub kind: ChangeKind,
    /// Full record content for creates and updates. `None` for deletes.
    pub data: Option<Record>,
    /// The ledger row that produced this update.
    pub change: Change,
}

/// Keyed record collection primitives a tracked store must expose.
pub trait RecordStore: Send + Sync {
    /// Creates a record, returning its id.
    fn create(&self, record: Record) -> EngineResult<String>;

    /// Returns all records in the collection.
    fn find_all(&self) -> EngineResult<Vec<Record>>;

    /// Returns the record with the given id, if any.
    fn find_by_id(&self, id: &str) -> EngineResult<Option<Record>>;

    /// Merges attributes into an existing record, returning the result.
    fn update_attributes(&self, id: &str, data: Record) -> EngineResult<Record>;

    /// Removes the record with the given id.
    fn destroy(&self, id: &str) -> EngineResult<()>;

    /// Applies a batch of creates, updates, and deletes keyed by id.
    fn bulk_apply(&self, updates: &[BulkUpdate]) -> EngineResult<()>;
}

/// Ledger row storage, one row per (model name, model id).
pub trait ChangeStore: Send + Sync {
    /// Returns the row for a (model name, model id) pair.
    fn get(&self, model_name: &str, model_id: &str) -> EngineResult<Option<Change>>;

    /// Inserts or overwrites a row.
    fn put(&self, change: Change) -> EngineResult<()>;

    /// Removes a row, if present.
    fn delete(&self, model_name: &str, model_id: &str) -> EngineResult<()>;

    /// Returns all rows for a model.
    fn all_for_model(&self, model_name: &str) -> EngineResult<Vec<Change>>;

    /// Returns all rows for a model with `checkpoint >= since`.
    fn since(&self, model_name: &str, checkpoint: u64) -> EngineResult<Vec<Change>> {
        let mut rows = self.all_for_model(model_name)?;
        rows.retain(|change| change.checkpoint >= checkpoint);
        Ok(rows)
    }
}

/// Singleton checkpoint record storage.
///
/// The checkpoint row is the only shared mutable resource requiring
/// atomicity; both `init` and `increment` must be atomic in the
/// underlying store. A store without a native atomic update primitive
/// cannot give the numeric-uniqueness guarantee.
pub trait CheckpointStore: Send + Sync {
    /// Returns the singleton record, if it exists.
    fn load(&self) -> EngineResult<Option<Checkpoint>>;

    /// Returns the singleton record, atomically creating it seeded at
    /// sequence 1 if absent.
    fn init(&self) -> EngineResult<Checkpoint>;

    /// Atomically advances the sequence by one and returns the new
    /// value, creating the seed record first if absent (so the first
    /// call on a fresh lineage returns 2).
    fn increment(&self) -> EngineResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_id_extraction() {
        let record = json!({"id": "c1", "name": "Ada"});
        assert_eq!(record_id(&record).unwrap(), "c1");
    }

    #[test]
    fn record_without_id_is_rejected() {
        assert!(matches!(
            record_id(&json!({"name": "Ada"})),
            Err(EngineError::MissingId)
        ));
        assert!(matches!(
            record_id(&json!({"id": 42})),
            Err(EngineError::MissingId)
        ));
    }
}
