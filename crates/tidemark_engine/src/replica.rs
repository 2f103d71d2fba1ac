//! The tracked replica.
//!
//! A `TrackedReplica` pairs one record store with its change ledger and
//! checkpoint lineage. All mutations that go through the replica update
//! the ledger as a side effect, which is what makes the store
//! replicable; writes that bypass the replica are reconciled by the
//! rectifier (see `RectifyMode`).

use crate::checkpoint::CheckpointSequencer;
use crate::error::EngineResult;
use crate::replicate::{ReplicationPhase, ReplicationStats};
use crate::store::{ChangeStore, CheckpointStore, Record, RecordStore};
use parking_lot::RwLock;
use std::sync::Arc;
use tidemark_ledger::Change;

/// An additive predicate over ledger rows.
///
/// Caller filters narrow a change query further; they never remove the
/// checkpoint or model-name predicates.
pub type ChangeFilter = dyn Fn(&Change) -> bool + Send + Sync;

/// One tracked store: records, their change ledger, and a checkpoint
/// lineage.
///
/// Cloning is cheap and yields a handle to the same underlying stores.
#[derive(Clone)]
pub struct TrackedReplica {
    model_name: String,
    records: Arc<dyn RecordStore>,
    ledger: Arc<dyn ChangeStore>,
    sequencer: CheckpointSequencer,
    phase: Arc<RwLock<ReplicationPhase>>,
    stats: Arc<RwLock<ReplicationStats>>,
}

impl TrackedReplica {
    /// Creates a replica with its own checkpoint lineage.
    pub fn new(
        model_name: impl Into<String>,
        records: Arc<dyn RecordStore>,
        ledger: Arc<dyn ChangeStore>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self::with_sequencer(model_name, records, ledger, CheckpointSequencer::new(checkpoints))
    }

    /// Creates a replica on a shared checkpoint lineage.
    ///
    /// Replicas sharing one sequencer advance a single timeline, which
    /// is required when their changes must stay mutually ordered.
    pub fn with_sequencer(
        model_name: impl Into<String>,
        records: Arc<dyn RecordStore>,
        ledger: Arc<dyn ChangeStore>,
        sequencer: CheckpointSequencer,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            records,
            ledger,
            sequencer,
            phase: Arc::new(RwLock::new(ReplicationPhase::Idle)),
            stats: Arc::new(RwLock::new(ReplicationStats::default())),
        }
    }

    /// The tracked model's name.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// The underlying record store.
    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    /// The change ledger.
    pub fn ledger(&self) -> &Arc<dyn ChangeStore> {
        &self.ledger
    }

    /// The checkpoint sequencer.
    pub fn sequencer(&self) -> &CheckpointSequencer {
        &self.sequencer
    }

    /// Creates a record and updates its ledger row.
    pub fn create(&self, record: Record) -> EngineResult<String> {
        let id = self.records.create(record)?;
        self.rectify_change(&id)?;
        Ok(id)
    }

    /// Finds a record by id.
    pub fn find_by_id(&self, id: &str) -> EngineResult<Option<Record>> {
        self.records.find_by_id(id)
    }

    /// Returns all records.
    pub fn find_all(&self) -> EngineResult<Vec<Record>> {
        self.records.find_all()
    }

    /// Merges attributes into a record and updates its ledger row.
    pub fn update_attributes(&self, id: &str, data: Record) -> EngineResult<Record> {
        let updated = self.records.update_attributes(id, data)?;
        self.rectify_change(id)?;
        Ok(updated)
    }

    /// Destroys a record and marks its ledger row deleted.
    pub fn destroy(&self, id: &str) -> EngineResult<()> {
        self.records.destroy(id)?;
        self.rectify_change(id)?;
        Ok(())
    }

    /// Returns all ledger rows with `checkpoint >= since`, narrowed by
    /// an optional caller filter.
    pub fn changes(
        &self,
        since: u64,
        filter: Option<&ChangeFilter>,
    ) -> EngineResult<Vec<Change>> {
        let mut rows = self.ledger.since(&self.model_name, since)?;
        if let Some(filter) = filter {
            rows.retain(|change| filter(change));
        }
        Ok(rows)
    }

    /// Advances this replica's checkpoint and returns the new sequence.
    pub fn checkpoint(&self) -> EngineResult<u64> {
        self.sequencer.bump_last_seq()
    }

    /// The phase of the most recent `replicate` call on this replica.
    ///
    /// The cell is one per replica, not one per call. Overlapping
    /// `replicate` calls on the same source interleave their phase
    /// writes, so the value is only meaningful while calls on this
    /// replica do not overlap.
    pub fn phase(&self) -> ReplicationPhase {
        *self.phase.read()
    }

    /// Cumulative replication statistics for this replica as source.
    pub fn stats(&self) -> ReplicationStats {
        self.stats.read().clone()
    }

    pub(crate) fn set_phase(&self, phase: ReplicationPhase) {
        *self.phase.write() = phase;
    }

    pub(crate) fn record_outcome(
        &self,
        records_applied: u64,
        chunks_applied: u64,
        conflicts_seen: u64,
    ) {
        let mut stats = self.stats.write();
        stats.calls_completed += 1;
        stats.records_applied += records_applied;
        stats.chunks_applied += chunks_applied;
        stats.conflicts_seen += conflicts_seen;
    }
}

impl std::fmt::Debug for TrackedReplica {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedReplica")
            .field("model_name", &self.model_name)
            .finish_non_exhaustive()
    }
}
