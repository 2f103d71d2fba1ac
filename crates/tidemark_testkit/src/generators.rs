//! Property-based test generators.

use proptest::prelude::*;
use serde_json::json;
use tidemark_engine::Record;
use tidemark_ledger::{Change, ChangeKind};

/// Strategy for a mutation kind.
pub fn arb_change_kind() -> impl Strategy<Value = ChangeKind> {
    prop_oneof![
        Just(ChangeKind::Create),
        Just(ChangeKind::Update),
        Just(ChangeKind::Delete),
        Just(ChangeKind::Unknown),
    ]
}

/// Strategy for a record with a short alphanumeric id.
pub fn arb_record() -> impl Strategy<Value = Record> {
    ("[a-z][a-z0-9]{0,7}", "[A-Za-z]{1,12}", 0u32..120).prop_map(|(id, name, age)| {
        json!({"id": id, "name": name, "age": age})
    })
}

/// Strategy for a ledger row of the given model.
pub fn arb_change(model_name: &'static str) -> impl Strategy<Value = Change> {
    (
        "[a-z][a-z0-9]{0,7}",
        prop::option::of("[0-9a-f]{8}"),
        1u64..50,
        arb_change_kind(),
    )
        .prop_map(move |(model_id, rev, checkpoint, kind)| {
            let mut change = Change::new(model_name, model_id, checkpoint);
            change.rev = rev;
            change.kind = kind;
            change
        })
}

/// Strategy for a change list with unique model ids.
pub fn arb_change_list(model_name: &'static str) -> impl Strategy<Value = Vec<Change>> {
    prop::collection::vec(arb_change(model_name), 0..16).prop_map(|changes| {
        let mut seen = std::collections::HashSet::new();
        changes
            .into_iter()
            .filter(|change| seen.insert(change.model_id.clone()))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn change_lists_have_unique_ids(changes in arb_change_list("Customer")) {
            let mut seen = std::collections::HashSet::new();
            for change in &changes {
                prop_assert!(seen.insert(change.model_id.clone()));
            }
        }

        #[test]
        fn records_carry_a_string_id(record in arb_record()) {
            prop_assert!(tidemark_engine::record_id(&record).is_ok());
        }
    }
}
