//! Conflict objects surfaced by replication.
//!
//! A `Conflict` is ephemeral: it is built per `replicate` call from a
//! record id plus handles to the two replicas, and discarded once
//! resolved or once the caller drops the outcome. Nothing about it is
//! persisted.

use crate::error::EngineResult;
use crate::replica::TrackedReplica;
use crate::store::{Record, RecordStore};
use std::sync::Arc;
use tidemark_ledger::{Change, ConflictKind, Resolution};

/// One record id with divergent concurrent edits on both sides.
#[derive(Clone)]
pub struct Conflict {
    model_id: String,
    source: TrackedReplica,
    target: TrackedReplica,
}

impl Conflict {
    pub(crate) fn new(
        model_id: impl Into<String>,
        source: TrackedReplica,
        target: TrackedReplica,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            source,
            target,
        }
    }

    /// The conflicting record id.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Classifies the conflict from its two ledger rows.
    ///
    /// Both-deleted pairs are filtered by the classifier upstream and
    /// never surface here, so the result is either `Update` (two live
    /// edits) or `Delete` (one side deleted, the other edited).
    pub fn kind(&self) -> EngineResult<ConflictKind> {
        let (source, target) = self.changes()?;
        Ok(ConflictKind::classify(&source, &target))
    }

    /// Returns the two raw ledger rows, source first.
    ///
    /// A missing row is a ledger inconsistency and is represented as a
    /// fresh deletion-like row rather than an error.
    pub fn changes(&self) -> EngineResult<(Change, Change)> {
        let source = self.side_change(&self.source)?;
        let target = self.side_change(&self.target)?;
        Ok((source, target))
    }

    fn side_change(&self, replica: &TrackedReplica) -> EngineResult<Change> {
        Ok(replica
            .ledger()
            .get(replica.model_name(), &self.model_id)?
            .unwrap_or_else(|| Change::new(replica.model_name(), &self.model_id, 0)))
    }

    /// Returns the two live record snapshots, source first.
    ///
    /// A side whose ledger row records a deletion resolves to `None`.
    /// The fetch happens at call time, so the snapshots reflect current
    /// store state rather than the state at diff time.
    pub fn models(&self) -> EngineResult<(Option<Record>, Option<Record>)> {
        let (source_change, target_change) = self.changes()?;
        let source = self.side_model(&self.source, &source_change)?;
        let target = self.side_model(&self.target, &target_change)?;
        Ok((source, target))
    }

    fn side_model(
        &self,
        replica: &TrackedReplica,
        change: &Change,
    ) -> EngineResult<Option<Record>> {
        if change.is_deletion() {
            return Ok(None);
        }
        replica.find_by_id(&self.model_id)
    }

    /// Resolves the conflict by letting one side win.
    ///
    /// The winning side's current state (including its deletion) is
    /// applied to the other side, and both ledger rows are cleared so
    /// the next `replicate` call treats the id as converged.
    pub fn resolve(&self, resolution: Resolution) -> EngineResult<()> {
        match resolution {
            Resolution::KeepSource => self.apply_winner(&self.source, &self.target),
            Resolution::KeepTarget => self.apply_winner(&self.target, &self.source),
        }
    }

    /// Resolves the conflict with a caller-supplied merge function.
    ///
    /// The function receives both snapshots and returns the merged
    /// record, or `None` to delete the id on both sides. The merged
    /// state is applied to both stores and both ledger rows are
    /// cleared.
    pub fn resolve_with<F>(&self, merge: F) -> EngineResult<()>
    where
        F: FnOnce(Option<&Record>, Option<&Record>) -> Option<Record>,
    {
        let (source, target) = self.models()?;
        let merged = merge(source.as_ref(), target.as_ref());
        apply_state(self.source.records(), &self.model_id, merged.as_ref())?;
        apply_state(self.target.records(), &self.model_id, merged.as_ref())?;
        self.clear_rows()
    }

    fn apply_winner(&self, winner: &TrackedReplica, loser: &TrackedReplica) -> EngineResult<()> {
        let row = self.side_change(winner)?;
        let state = if row.is_deletion() {
            None
        } else {
            winner.find_by_id(&self.model_id)?
        };
        apply_state(loser.records(), &self.model_id, state.as_ref())?;
        self.clear_rows()
    }

    fn clear_rows(&self) -> EngineResult<()> {
        self.source
            .ledger()
            .delete(self.source.model_name(), &self.model_id)?;
        self.target
            .ledger()
            .delete(self.target.model_name(), &self.model_id)?;
        Ok(())
    }
}

/// Writes a full record state (or its absence) into a raw store.
///
/// The state replaces the stored record wholesale; keys present only
/// in the prior record do not survive.
fn apply_state(
    store: &Arc<dyn RecordStore>,
    id: &str,
    state: Option<&Record>,
) -> EngineResult<()> {
    if store.find_by_id(id)?.is_some() {
        store.destroy(id)?;
    }
    if let Some(data) = state {
        store.create(data.clone())?;
    }
    Ok(())
}

impl std::fmt::Debug for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conflict")
            .field("model_id", &self.model_id)
            .field("source", &self.source.model_name())
            .field("target", &self.target.model_name())
            .finish()
    }
}
