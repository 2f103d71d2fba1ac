//! Conflict classification and resolution strategies.

use crate::change::Change;

/// The shape of a surfaced conflict.
///
/// Pairs where both sides deleted are filtered by the classifier before
/// conflicts are built, so they never reach this classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Both sides hold live, divergent edits.
    Update,
    /// One side deleted while the other side edited.
    Delete,
}

impl ConflictKind {
    /// Classifies a conflict from its two ledger rows.
    ///
    /// Classification goes by the revision rather than the recorded
    /// mutation kind: a row without a revision is a deletion even when
    /// its kind is still undetermined (e.g. a synthesized row standing
    /// in for a missing ledger entry).
    pub fn classify(source: &Change, target: &Change) -> Self {
        if source.is_deletion() || target.is_deletion() {
            ConflictKind::Delete
        } else {
            ConflictKind::Update
        }
    }
}

/// How to resolve a conflict.
///
/// Resolution is never automatic: the replication orchestrator only
/// reports conflicts, and one of these strategies is applied by the
/// caller through `Conflict::resolve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The source's state wins; it is applied to the target.
    KeepSource,
    /// The target's state wins; it is applied to the source.
    KeepTarget,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeKind;

    fn row(kind: ChangeKind, rev: Option<&str>) -> Change {
        let mut change = Change::new("Customer", "c1", 1);
        change.kind = kind;
        change.rev = rev.map(String::from);
        change
    }

    #[test]
    fn both_edits_classify_as_update() {
        let source = row(ChangeKind::Update, Some("r1"));
        let target = row(ChangeKind::Create, Some("r2"));
        assert_eq!(ConflictKind::classify(&source, &target), ConflictKind::Update);
    }

    #[test]
    fn either_side_deleted_classifies_as_delete() {
        let deleted = row(ChangeKind::Delete, None);
        let edited = row(ChangeKind::Update, Some("r2"));
        assert_eq!(ConflictKind::classify(&deleted, &edited), ConflictKind::Delete);
        assert_eq!(ConflictKind::classify(&edited, &deleted), ConflictKind::Delete);
    }

    #[test]
    fn missing_revision_counts_as_deleted_regardless_of_kind() {
        let synthesized = row(ChangeKind::Unknown, None);
        let edited = row(ChangeKind::Update, Some("r2"));
        assert_eq!(
            ConflictKind::classify(&synthesized, &edited),
            ConflictKind::Delete
        );
    }
}
