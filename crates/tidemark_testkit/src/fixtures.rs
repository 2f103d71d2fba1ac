//! Fixture builders for tracked replica pairs.

use crate::stores::{CountingRecordStore, MemoryChangeStore, MemoryCheckpointStore, MemoryRecordStore};
use serde_json::json;
use std::sync::Arc;
use tidemark_engine::{Record, TrackedReplica};
use uuid::Uuid;

/// Builds a replica over fresh in-memory stores.
pub fn memory_replica(model_name: &str) -> TrackedReplica {
    TrackedReplica::new(
        model_name,
        Arc::new(MemoryRecordStore::new()),
        Arc::new(MemoryChangeStore::new()),
        Arc::new(MemoryCheckpointStore::new()),
    )
}

/// Builds a source/target pair tracking the same model name on
/// independent stores and independent checkpoint lineages.
pub fn tracked_pair(model_name: &str) -> (TrackedReplica, TrackedReplica) {
    (memory_replica(model_name), memory_replica(model_name))
}

/// Builds a pair whose target record store is wrapped in a
/// `CountingRecordStore`, returned alongside for assertions.
pub fn counting_pair(
    model_name: &str,
) -> (TrackedReplica, TrackedReplica, Arc<CountingRecordStore>) {
    let source = memory_replica(model_name);
    let counting = Arc::new(CountingRecordStore::new(Arc::new(MemoryRecordStore::new())));
    let target = TrackedReplica::new(
        model_name,
        Arc::clone(&counting) as Arc<dyn tidemark_engine::RecordStore>,
        Arc::new(MemoryChangeStore::new()),
        Arc::new(MemoryCheckpointStore::new()),
    );
    (source, target, counting)
}

/// Builds a record with the given id and a `name` attribute.
pub fn named_record(id: &str, name: &str) -> Record {
    json!({"id": id, "name": name})
}

/// Builds a record with a generated uuid id.
pub fn fresh_record(name: &str) -> Record {
    named_record(&Uuid::new_v4().to_string(), name)
}
