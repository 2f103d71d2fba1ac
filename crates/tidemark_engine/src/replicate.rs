//! The replication orchestrator.
//!
//! `TrackedReplica::replicate` drives one end-to-end pass: fetch both
//! sides' changes since their last sync points, classify them, apply
//! the non-conflicting deltas to the target in size-bounded chunks, and
//! return the conflicts plus the checkpoints a follow-up call should
//! use as its `since`.

use crate::config::ReplicationOptions;
use crate::conflict::Conflict;
use crate::error::EngineResult;
use crate::replica::TrackedReplica;
use crate::store::BulkUpdate;
use tidemark_ledger::{diff_changes, ChangeKind};
use tracing::{debug, info};

/// A pair of checkpoint sequence values, one per side.
///
/// The default pair (`0`, `0`) means "all history": every real
/// checkpoint is at least 1, so a query with `since = 0` matches every
/// ledger row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckpointPair {
    /// Sequence value on the source side.
    pub source: u64,
    /// Sequence value on the target side.
    pub target: u64,
}

impl CheckpointPair {
    /// A pair covering all history on both sides.
    pub fn all_history() -> Self {
        Self::default()
    }
}

impl From<u64> for CheckpointPair {
    fn from(seq: u64) -> Self {
        Self {
            source: seq,
            target: seq,
        }
    }
}

/// The phase a `replicate` call is in.
///
/// Each call walks the phases in order; there are no retries at this
/// layer, so a store failure leaves the call wherever it aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationPhase {
    /// No call has run yet.
    Idle,
    /// Normalizing `since` and advancing both checkpoints.
    ComputingSince,
    /// Reading both sides' change lists.
    FetchingChanges,
    /// Running the diff/classifier.
    Classifying,
    /// Applying delta chunks to the target, sequentially.
    ApplyingChunks,
    /// The call finished.
    Done,
}

impl ReplicationPhase {
    /// Returns true if a call is currently between start and finish.
    pub fn is_active(&self) -> bool {
        !matches!(self, ReplicationPhase::Idle | ReplicationPhase::Done)
    }
}

/// Cumulative counters across `replicate` calls.
#[derive(Debug, Clone, Default)]
pub struct ReplicationStats {
    /// Completed `replicate` calls.
    pub calls_completed: u64,
    /// Records applied to targets.
    pub records_applied: u64,
    /// Bulk-apply chunks issued.
    pub chunks_applied: u64,
    /// Conflicts surfaced to callers.
    pub conflicts_seen: u64,
}

/// What one `replicate` call produced.
///
/// Conflicts are data, not errors; the call only fails for store-level
/// failures. `checkpoints` holds the values observed at the start of
/// the call, so passing them as `since` to the next call picks up any
/// changes made while this one ran.
#[derive(Debug)]
pub struct ReplicationOutcome {
    /// Divergent ids requiring explicit resolution.
    pub conflicts: Vec<Conflict>,
    /// Each side's checkpoint at the start of this call.
    pub checkpoints: CheckpointPair,
}

impl TrackedReplica {
    /// Replicates changes from this replica to `target`.
    ///
    /// `since` carries each side's last sync point; the default pair
    /// replicates all history. Delta application is chunked by
    /// `options.chunk_size` and strictly sequential: chunk N+1 is not
    /// issued before chunk N's apply completes, bounding peak payload
    /// size and giving natural backpressure against a slow target. A
    /// failed chunk aborts the call; re-invoking with the same `since`
    /// is safe because classification is recomputed from the ledger.
    pub fn replicate(
        &self,
        target: &TrackedReplica,
        since: CheckpointPair,
        options: &ReplicationOptions,
    ) -> EngineResult<ReplicationOutcome> {
        self.set_phase(ReplicationPhase::ComputingSince);
        // Advance both lineages first: changes made while this call
        // runs land at or after these values, so the returned pair is a
        // safe `since` for the next call.
        let checkpoints = CheckpointPair {
            source: self.checkpoint()?,
            target: target.checkpoint()?,
        };

        self.set_phase(ReplicationPhase::FetchingChanges);
        let filter = options.filter.as_deref();
        let source_changes = self.changes(since.source, filter)?;
        let target_changes = target.changes(since.target, filter)?;

        self.set_phase(ReplicationPhase::Classifying);
        let diff = diff_changes(&source_changes, &target_changes);
        let conflicts: Vec<Conflict> = diff
            .conflict_ids
            .iter()
            .map(|id| Conflict::new(id.clone(), self.clone(), target.clone()))
            .collect();
        debug!(
            source = self.model_name(),
            target = target.model_name(),
            deltas = diff.deltas.len(),
            conflicts = conflicts.len(),
            "classified changes"
        );

        self.set_phase(ReplicationPhase::ApplyingChunks);
        let updates = self.build_updates(diff.deltas)?;
        let chunk_size = options.chunk_size.unwrap_or(updates.len().max(1));
        let mut chunks_applied = 0u64;
        let mut records_applied = 0u64;
        for chunk in updates.chunks(chunk_size.max(1)) {
            target.records().bulk_apply(chunk)?;
            // The raw bulk apply bypasses the target's mutation entry
            // points, so its ledger is brought up to date here.
            for update in chunk {
                target.rectify_change(&update.change.model_id)?;
            }
            chunks_applied += 1;
            records_applied += chunk.len() as u64;
            debug!(
                target = target.model_name(),
                chunk = chunks_applied,
                records = chunk.len(),
                "applied chunk"
            );
        }

        self.set_phase(ReplicationPhase::Done);
        self.record_outcome(records_applied, chunks_applied, conflicts.len() as u64);
        info!(
            source = self.model_name(),
            target = target.model_name(),
            records = records_applied,
            chunks = chunks_applied,
            conflicts = conflicts.len(),
            "replication pass finished"
        );

        Ok(ReplicationOutcome {
            conflicts,
            checkpoints,
        })
    }

    /// Builds the bulk-apply batch for a list of delta changes.
    ///
    /// Records are fetched at apply time, not diff time: a record that
    /// vanished since its change was written is applied as a deletion.
    fn build_updates(
        &self,
        deltas: Vec<tidemark_ledger::Change>,
    ) -> EngineResult<Vec<BulkUpdate>> {
        let mut updates = Vec::with_capacity(deltas.len());
        for change in deltas {
            let data = self.find_by_id(&change.model_id)?;
            let kind = if data.is_none() {
                ChangeKind::Delete
            } else {
                change.kind
            };
            updates.push(BulkUpdate { kind, data, change });
        }
        Ok(updates)
    }
}

/// Runs one replication pass in each direction between two replicas.
///
/// Convenience for pairwise topologies: `a` is replicated to `b`, then
/// `b` to `a`, and both outcomes are returned in that order. Conflicts
/// detected in the first direction will generally be re-detected in the
/// second; callers resolve from either outcome.
pub fn sync_pair(
    a: &TrackedReplica,
    b: &TrackedReplica,
    since_ab: CheckpointPair,
    since_ba: CheckpointPair,
    options: &ReplicationOptions,
) -> EngineResult<(ReplicationOutcome, ReplicationOutcome)> {
    let forward = a.replicate(b, since_ab, options)?;
    let backward = b.replicate(a, since_ba, options)?;
    Ok((forward, backward))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_activity_checks() {
        assert!(!ReplicationPhase::Idle.is_active());
        assert!(!ReplicationPhase::Done.is_active());
        assert!(ReplicationPhase::ComputingSince.is_active());
        assert!(ReplicationPhase::FetchingChanges.is_active());
        assert!(ReplicationPhase::Classifying.is_active());
        assert!(ReplicationPhase::ApplyingChunks.is_active());
    }

    #[test]
    fn default_pair_covers_all_history() {
        assert_eq!(CheckpointPair::default(), CheckpointPair::all_history());
        assert_eq!(CheckpointPair::all_history().source, 0);
    }

    #[test]
    fn pair_from_single_value() {
        let pair = CheckpointPair::from(7);
        assert_eq!(pair.source, 7);
        assert_eq!(pair.target, 7);
    }
}
