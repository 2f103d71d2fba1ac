//! Change ledger rows.
//!
//! A `Change` records the latest known state of one record id: its
//! revision fingerprint, the kind of the last mutation, and the
//! checkpoint at which that mutation was observed. The ledger keeps
//! exactly one row per (model name, model id) pair; rows are
//! overwritten, never appended, so the ledger is a snapshot of "latest
//! known per id", not a history.

use serde::{Deserialize, Serialize};

/// The kind of mutation a ledger row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Record was created (no prior revision existed).
    Create,
    /// Record was updated (a prior revision existed).
    Update,
    /// Record was deleted.
    Delete,
    /// Row exists but the mutation kind has not been determined yet.
    Unknown,
}

/// One ledger row: the latest known change for a single record id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Row id, `<model_name>.<model_id>`.
    pub id: String,
    /// Revision fingerprint of the record content. `None` once deleted.
    pub rev: Option<String>,
    /// Name of the tracked model this row belongs to.
    pub model_name: String,
    /// Id of the tracked record.
    pub model_id: String,
    /// Checkpoint at which this row last changed.
    pub checkpoint: u64,
    /// Kind of the last observed mutation.
    pub kind: ChangeKind,
}

impl Change {
    /// Creates a fresh row with no revision and an undetermined kind.
    pub fn new(
        model_name: impl Into<String>,
        model_id: impl Into<String>,
        checkpoint: u64,
    ) -> Self {
        let model_name = model_name.into();
        let model_id = model_id.into();
        Self {
            id: Self::ledger_id(&model_name, &model_id),
            rev: None,
            model_name,
            model_id,
            checkpoint,
            kind: ChangeKind::Unknown,
        }
    }

    /// Builds the row id for a (model name, model id) pair.
    pub fn ledger_id(model_name: &str, model_id: &str) -> String {
        format!("{model_name}.{model_id}")
    }

    /// Returns true if this row records a deletion.
    pub fn is_deletion(&self) -> bool {
        self.rev.is_none()
    }

    /// Returns true if both rows carry the same revision.
    ///
    /// Two deletions (both `None`) compare equal: a record deleted on
    /// both sides is convergent state.
    pub fn same_rev(&self, other: &Change) -> bool {
        self.rev == other.rev
    }

    /// Folds a freshly computed revision into this row.
    ///
    /// Classifies the mutation kind against the prior revision and
    /// stamps `checkpoint`. Returns `false` (row untouched) when the
    /// revision did not actually change.
    pub fn observe(&mut self, rev: Option<String>, checkpoint: u64) -> bool {
        if self.rev == rev {
            return false;
        }
        self.kind = match (&self.rev, &rev) {
            (None, Some(_)) => ChangeKind::Create,
            (Some(_), Some(_)) => ChangeKind::Update,
            (_, None) => ChangeKind::Delete,
        };
        self.rev = rev;
        self.checkpoint = checkpoint;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_row_is_unknown() {
        let change = Change::new("Customer", "c1", 1);
        assert_eq!(change.id, "Customer.c1");
        assert_eq!(change.kind, ChangeKind::Unknown);
        assert!(change.is_deletion());
    }

    #[test]
    fn observe_classifies_create_update_delete() {
        let mut change = Change::new("Customer", "c1", 1);

        assert!(change.observe(Some("r1".into()), 1));
        assert_eq!(change.kind, ChangeKind::Create);
        assert_eq!(change.checkpoint, 1);

        assert!(change.observe(Some("r2".into()), 2));
        assert_eq!(change.kind, ChangeKind::Update);
        assert_eq!(change.checkpoint, 2);

        assert!(change.observe(None, 3));
        assert_eq!(change.kind, ChangeKind::Delete);
        assert!(change.is_deletion());
    }

    #[test]
    fn observe_same_rev_is_a_no_op() {
        let mut change = Change::new("Customer", "c1", 1);
        change.observe(Some("r1".into()), 1);

        assert!(!change.observe(Some("r1".into()), 5));
        assert_eq!(change.kind, ChangeKind::Create);
        assert_eq!(change.checkpoint, 1);
    }

    #[test]
    fn same_rev_treats_double_delete_as_equal() {
        let a = Change::new("Customer", "c1", 1);
        let b = Change::new("Customer", "c1", 4);
        assert!(a.same_rev(&b));
    }
}
