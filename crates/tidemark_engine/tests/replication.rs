//! End-to-end replication tests over in-memory stores.

use serde_json::json;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tidemark_engine::{
    sync_pair, CheckpointPair, CheckpointSequencer, CheckpointStore, RecordStore, RectifyMode,
    ReplicationOptions, ReplicationPhase, TrackedReplica,
};
use tidemark_ledger::{ConflictKind, Resolution};
use tidemark_testkit::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tidemark_engine=debug")
        .with_test_writer()
        .try_init();
}

fn options() -> ReplicationOptions {
    ReplicationOptions::default()
}

#[test]
fn fresh_lineage_checkpoint_sequence() {
    let store: Arc<dyn CheckpointStore> = Arc::new(MemoryCheckpointStore::new());
    let sequencer = CheckpointSequencer::new(store);

    assert_eq!(sequencer.current().unwrap(), 1);
    assert_eq!(sequencer.bump_last_seq().unwrap(), 2);
    assert_eq!(sequencer.bump_last_seq().unwrap(), 3);
    assert_eq!(sequencer.current().unwrap(), 3);
}

#[test]
fn concurrent_reads_keep_a_single_checkpoint_record() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store: Arc<dyn CheckpointStore> = Arc::clone(&store) as _;
            thread::spawn(move || CheckpointSequencer::new(store).current().unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 1);
    }
    assert_eq!(store.load().unwrap().unwrap().seq, 1);
}

#[test]
fn concurrent_bumps_never_return_the_same_value() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store: Arc<dyn CheckpointStore> = Arc::clone(&store) as _;
            thread::spawn(move || {
                let sequencer = CheckpointSequencer::new(store);
                (0..10)
                    .map(|_| sequencer.bump_last_seq().unwrap())
                    .collect::<Vec<u64>>()
            })
        })
        .collect();

    let mut values: Vec<u64> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    values.sort_unstable();
    values.dedup();
    assert_eq!(values.len(), 80);
    assert_eq!(store.load().unwrap().unwrap().seq, 81);
}

#[test]
fn replicas_can_share_a_checkpoint_lineage() {
    let store: Arc<dyn CheckpointStore> = Arc::new(MemoryCheckpointStore::new());
    let sequencer = CheckpointSequencer::new(store);
    let orders = TrackedReplica::with_sequencer(
        "Order",
        Arc::new(MemoryRecordStore::new()),
        Arc::new(MemoryChangeStore::new()),
        sequencer.clone(),
    );
    let invoices = TrackedReplica::with_sequencer(
        "Invoice",
        Arc::new(MemoryRecordStore::new()),
        Arc::new(MemoryChangeStore::new()),
        sequencer,
    );

    assert_eq!(orders.checkpoint().unwrap(), 2);
    assert_eq!(invoices.sequencer().current().unwrap(), 2);
}

#[test]
fn empty_replicate_reports_nothing() {
    let (source, target) = tracked_pair("Customer");

    let outcome = source
        .replicate(&target, CheckpointPair::all_history(), &options())
        .unwrap();

    assert!(outcome.conflicts.is_empty());
    assert!(target.find_all().unwrap().is_empty());
}

#[test]
fn created_records_replicate_deeply_equal() {
    init_tracing();
    let (source, target) = tracked_pair("Customer");
    source.create(named_record("c1", "Ada")).unwrap();
    source
        .create(json!({"id": "c2", "name": "Grace", "tags": ["pilot", "engineer"]}))
        .unwrap();

    let outcome = source
        .replicate(&target, CheckpointPair::all_history(), &options())
        .unwrap();

    assert!(outcome.conflicts.is_empty());
    for id in ["c1", "c2"] {
        assert_eq!(
            target.find_by_id(id).unwrap(),
            source.find_by_id(id).unwrap()
        );
    }
    assert_eq!(source.phase(), ReplicationPhase::Done);
    let stats = source.stats();
    assert_eq!(stats.calls_completed, 1);
    assert_eq!(stats.records_applied, 2);
    assert_eq!(stats.chunks_applied, 1);
}

#[test]
fn concurrent_edits_conflict_then_resolve_then_converge() {
    let (source, target) = tracked_pair("Customer");
    source.create(named_record("c1", "Ada")).unwrap();
    let first = source
        .replicate(&target, CheckpointPair::all_history(), &options())
        .unwrap();
    assert!(first.conflicts.is_empty());

    source
        .update_attributes("c1", json!({"name": "Grace"}))
        .unwrap();
    target
        .update_attributes("c1", json!({"name": "Linus"}))
        .unwrap();

    let second = source
        .replicate(&target, first.checkpoints, &options())
        .unwrap();
    assert_eq!(second.conflicts.len(), 1);
    let conflict = &second.conflicts[0];
    assert_eq!(conflict.model_id(), "c1");
    assert_eq!(conflict.kind().unwrap(), ConflictKind::Update);

    let (source_snapshot, target_snapshot) = conflict.models().unwrap();
    assert_eq!(source_snapshot.unwrap()["name"], "Grace");
    assert_eq!(target_snapshot.unwrap()["name"], "Linus");

    conflict.resolve(Resolution::KeepSource).unwrap();
    assert_eq!(target.find_by_id("c1").unwrap().unwrap()["name"], "Grace");

    let third = source
        .replicate(&target, second.checkpoints, &options())
        .unwrap();
    assert!(third.conflicts.is_empty());
    assert_eq!(
        source.find_by_id("c1").unwrap(),
        target.find_by_id("c1").unwrap()
    );
}

#[test]
fn resolution_replaces_the_loser_record_wholesale() {
    let (source, target) = tracked_pair("Customer");
    source.create(named_record("c1", "Ada")).unwrap();
    let first = source
        .replicate(&target, CheckpointPair::all_history(), &options())
        .unwrap();

    source
        .update_attributes("c1", json!({"role": "architect"}))
        .unwrap();
    target
        .update_attributes("c1", json!({"team": "kernel"}))
        .unwrap();

    let second = source
        .replicate(&target, first.checkpoints, &options())
        .unwrap();
    assert_eq!(second.conflicts.len(), 1);
    second.conflicts[0].resolve(Resolution::KeepSource).unwrap();

    // The loser's own edit must not survive as a stale key.
    let resolved = target.find_by_id("c1").unwrap().unwrap();
    assert!(resolved.get("team").is_none());
    assert_eq!(resolved["role"], "architect");
    assert_eq!(resolved, source.find_by_id("c1").unwrap().unwrap());

    let third = source
        .replicate(&target, second.checkpoints, &options())
        .unwrap();
    assert!(third.conflicts.is_empty());
    assert_eq!(
        source.find_by_id("c1").unwrap(),
        target.find_by_id("c1").unwrap()
    );
}

#[test]
fn delete_against_update_surfaces_a_delete_conflict() {
    let (source, target) = tracked_pair("Customer");
    source.create(named_record("c1", "Ada")).unwrap();
    let first = source
        .replicate(&target, CheckpointPair::all_history(), &options())
        .unwrap();

    source.destroy("c1").unwrap();
    target
        .update_attributes("c1", json!({"name": "Linus"}))
        .unwrap();

    let second = source
        .replicate(&target, first.checkpoints, &options())
        .unwrap();
    assert_eq!(second.conflicts.len(), 1);
    let conflict = &second.conflicts[0];
    assert_eq!(conflict.kind().unwrap(), ConflictKind::Delete);

    let (source_snapshot, target_snapshot) = conflict.models().unwrap();
    assert!(source_snapshot.is_none());
    assert_eq!(target_snapshot.unwrap()["name"], "Linus");
}

#[test]
fn deletion_on_both_sides_is_convergent() {
    let (source, target) = tracked_pair("Customer");
    source.create(named_record("c1", "Ada")).unwrap();
    let first = source
        .replicate(&target, CheckpointPair::all_history(), &options())
        .unwrap();

    source.destroy("c1").unwrap();
    target.destroy("c1").unwrap();

    let second = source
        .replicate(&target, first.checkpoints, &options())
        .unwrap();
    assert!(second.conflicts.is_empty());
    assert!(target.find_by_id("c1").unwrap().is_none());
}

#[test]
fn chunked_apply_invokes_bulk_apply_per_chunk() {
    let (source, target, counting) = counting_pair("Customer");
    source.create(named_record("c1", "Ada")).unwrap();
    source.create(named_record("c2", "Grace")).unwrap();

    let outcome = source
        .replicate(
            &target,
            CheckpointPair::all_history(),
            &options().with_chunk_size(1),
        )
        .unwrap();

    assert!(outcome.conflicts.is_empty());
    assert_eq!(counting.bulk_applies(), 2);
    assert_eq!(target.find_all().unwrap().len(), 2);
}

#[test]
fn unbounded_apply_uses_a_single_chunk() {
    let (source, target, counting) = counting_pair("Customer");
    source.create(named_record("c1", "Ada")).unwrap();
    source.create(named_record("c2", "Grace")).unwrap();

    source
        .replicate(&target, CheckpointPair::all_history(), &options())
        .unwrap();

    assert_eq!(counting.bulk_applies(), 1);
    assert_eq!(target.find_all().unwrap().len(), 2);
}

#[test]
fn failed_chunk_aborts_the_remaining_chunks() {
    let source = memory_replica("Customer");
    source.create(named_record("c1", "Ada")).unwrap();
    source.create(named_record("c2", "Grace")).unwrap();

    let inner = Arc::new(MemoryRecordStore::new());
    let failing = Arc::new(FailingRecordStore::new(
        Arc::clone(&inner) as Arc<dyn RecordStore>,
        1,
    ));
    let target = TrackedReplica::new(
        "Customer",
        failing as Arc<dyn RecordStore>,
        Arc::new(MemoryChangeStore::new()),
        Arc::new(MemoryCheckpointStore::new()),
    );

    let error = source
        .replicate(
            &target,
            CheckpointPair::all_history(),
            &options().with_chunk_size(1),
        )
        .unwrap_err();

    assert!(error.is_retryable());
    // Only the first chunk landed before the abort.
    assert_eq!(inner.len(), 1);
}

#[test]
fn retrying_with_the_same_since_converges_after_a_failed_chunk() {
    let source = memory_replica("Customer");
    source.create(named_record("c1", "Ada")).unwrap();
    source.create(named_record("c2", "Grace")).unwrap();
    source.create(named_record("c3", "Linus")).unwrap();

    let inner = Arc::new(MemoryRecordStore::new());
    let failing = Arc::new(FailingRecordStore::new(
        Arc::clone(&inner) as Arc<dyn RecordStore>,
        1,
    ));
    let target = TrackedReplica::new(
        "Customer",
        Arc::clone(&failing) as Arc<dyn RecordStore>,
        Arc::new(MemoryChangeStore::new()),
        Arc::new(MemoryCheckpointStore::new()),
    );

    let error = source
        .replicate(
            &target,
            CheckpointPair::all_history(),
            &options().with_chunk_size(1),
        )
        .unwrap_err();
    assert!(error.is_retryable());
    assert_eq!(inner.len(), 1);

    // Clear the injected fault and re-invoke with the same since pair.
    // The chunk that already landed is a no-op on the retry, so the
    // target ends with the full record set and no duplicates.
    failing.raise_allowance(8);
    let outcome = source
        .replicate(
            &target,
            CheckpointPair::all_history(),
            &options().with_chunk_size(1),
        )
        .unwrap();

    assert!(outcome.conflicts.is_empty());
    assert_eq!(inner.len(), 3);
    for id in ["c1", "c2", "c3"] {
        assert_eq!(
            target.find_by_id(id).unwrap(),
            source.find_by_id(id).unwrap()
        );
    }
}

#[test]
fn caller_filters_narrow_but_never_widen_the_query() {
    let (source, target) = tracked_pair("Customer");
    source.create(named_record("a1", "Ada")).unwrap();
    source.create(named_record("b1", "Bea")).unwrap();

    let outcome = source
        .replicate(
            &target,
            CheckpointPair::all_history(),
            &options().with_filter(|change| change.model_id.starts_with('a')),
        )
        .unwrap();

    assert!(outcome.conflicts.is_empty());
    assert!(target.find_by_id("a1").unwrap().is_some());
    assert!(target.find_by_id("b1").unwrap().is_none());
}

#[test]
fn rectify_all_reports_only_out_of_band_edits() {
    let records = Arc::new(MemoryRecordStore::new());
    let replica = TrackedReplica::new(
        "Customer",
        Arc::clone(&records) as Arc<dyn RecordStore>,
        Arc::new(MemoryChangeStore::new()),
        Arc::new(MemoryCheckpointStore::new()),
    );
    for i in 0..5 {
        replica
            .create(json!({"id": format!("c{i}"), "group": if i < 2 { "x" } else { "y" }}))
            .unwrap();
    }

    let since = replica.checkpoint().unwrap();

    // A bulk filtered update lands behind the replica's back: every
    // record in group "x" gains a flag, touching 2 of the 5 ids.
    for record in records.find_all().unwrap() {
        if record["group"] == "x" {
            let mut edited = record.clone();
            edited["flagged"] = json!(true);
            records.put_untracked(edited);
        }
    }

    let touched = replica.rectify_all().unwrap();
    assert_eq!(touched, 2);

    let mut changed: Vec<String> = replica
        .changes(since, None)
        .unwrap()
        .into_iter()
        .map(|change| change.model_id)
        .collect();
    changed.sort();
    assert_eq!(changed, vec!["c0".to_string(), "c1".to_string()]);
}

#[test]
fn rectify_once_reconciles_at_enable_time() {
    let records = Arc::new(MemoryRecordStore::new());
    let replica = TrackedReplica::new(
        "Customer",
        Arc::clone(&records) as Arc<dyn RecordStore>,
        Arc::new(MemoryChangeStore::new()),
        Arc::new(MemoryCheckpointStore::new()),
    );
    records.put_untracked(named_record("c1", "Ada"));

    let runner = replica.start_auto_rectify(RectifyMode::Once).unwrap();
    assert!(runner.is_none());
    assert_eq!(replica.changes(0, None).unwrap().len(), 1);
}

#[test]
fn periodic_rectify_picks_up_out_of_band_writes() {
    let records = Arc::new(MemoryRecordStore::new());
    let replica = TrackedReplica::new(
        "Customer",
        Arc::clone(&records) as Arc<dyn RecordStore>,
        Arc::new(MemoryChangeStore::new()),
        Arc::new(MemoryCheckpointStore::new()),
    );

    let runner = replica
        .start_auto_rectify(RectifyMode::Every(Duration::from_millis(25)))
        .unwrap()
        .unwrap();

    records.put_untracked(named_record("c1", "Ada"));
    let mut reconciled = false;
    for _ in 0..40 {
        thread::sleep(Duration::from_millis(25));
        if !replica.changes(0, None).unwrap().is_empty() {
            reconciled = true;
            break;
        }
    }
    runner.stop();
    assert!(reconciled);
}

#[test]
fn sync_pair_converges_both_directions() {
    let (a, b) = tracked_pair("Customer");
    a.create(named_record("a1", "Ada")).unwrap();
    b.create(named_record("b1", "Bea")).unwrap();

    let (forward, backward) = sync_pair(
        &a,
        &b,
        CheckpointPair::all_history(),
        CheckpointPair::all_history(),
        &options(),
    )
    .unwrap();

    assert!(forward.conflicts.is_empty());
    assert!(backward.conflicts.is_empty());
    for id in ["a1", "b1"] {
        assert_eq!(a.find_by_id(id).unwrap(), b.find_by_id(id).unwrap());
        assert!(a.find_by_id(id).unwrap().is_some());
    }
}

#[test]
fn resolve_with_merges_both_sides() {
    let (source, target) = tracked_pair("Customer");
    source.create(named_record("c1", "Ada")).unwrap();
    let first = source
        .replicate(&target, CheckpointPair::all_history(), &options())
        .unwrap();

    source
        .update_attributes("c1", json!({"role": "architect"}))
        .unwrap();
    target
        .update_attributes("c1", json!({"team": "kernel"}))
        .unwrap();

    let second = source
        .replicate(&target, first.checkpoints, &options())
        .unwrap();
    assert_eq!(second.conflicts.len(), 1);

    second.conflicts[0]
        .resolve_with(|ours, theirs| {
            let mut merged = ours.cloned().unwrap_or_else(|| json!({"id": "c1"}));
            if let Some(theirs) = theirs.and_then(|value| value.as_object()) {
                for (key, value) in theirs {
                    merged[key.as_str()] = value.clone();
                }
            }
            Some(merged)
        })
        .unwrap();

    let ours = source.find_by_id("c1").unwrap().unwrap();
    let theirs = target.find_by_id("c1").unwrap().unwrap();
    assert_eq!(ours, theirs);
    assert_eq!(ours["role"], "architect");
    assert_eq!(ours["team"], "kernel");

    let third = source
        .replicate(&target, second.checkpoints, &options())
        .unwrap();
    assert!(third.conflicts.is_empty());
}
