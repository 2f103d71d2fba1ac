//! The diff/classifier.
//!
//! Given the change lists of two stores ("source since X" and "target
//! since Y"), partitions record ids into safe-to-apply deltas,
//! conflicts, and no-ops for the source-to-target direction.

use crate::change::Change;
use std::collections::HashMap;

/// Result of classifying two change lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffResult {
    /// Source changes safe to apply to the target.
    pub deltas: Vec<Change>,
    /// Record ids with divergent concurrent edits on both sides.
    pub conflict_ids: Vec<String>,
}

impl DiffResult {
    /// Returns true if there is nothing to apply and nothing in conflict.
    pub fn is_converged(&self) -> bool {
        self.deltas.is_empty() && self.conflict_ids.is_empty()
    }
}

/// Classifies source changes against target changes.
///
/// For each source change, keyed by model id:
/// - the target never changed the id: safe delta
/// - both sides changed it to the same revision: no-op, already converged
/// - both sides deleted it: no-op, convergent deletion
/// - both sides changed it to different revisions: conflict
///
/// Ids the target changed but the source did not are ignored here; they
/// belong to the reverse replication direction. There is no automatic
/// precedence between divergent revisions: every divergence is a
/// conflict and resolution is an explicit caller action.
pub fn diff_changes(source: &[Change], target: &[Change]) -> DiffResult {
    let by_id: HashMap<&str, &Change> = target
        .iter()
        .map(|change| (change.model_id.as_str(), change))
        .collect();

    let mut result = DiffResult::default();
    for change in source {
        match by_id.get(change.model_id.as_str()) {
            None => result.deltas.push(change.clone()),
            Some(theirs) if change.same_rev(theirs) => {}
            Some(_) => result.conflict_ids.push(change.model_id.clone()),
        }
    }
    result
}
