//! # Tidemark Engine
//!
//! Change tracking and replication over opaque keyed record stores.
//!
//! This crate provides:
//! - Store ports (`RecordStore`, `ChangeStore`, `CheckpointStore`)
//! - The checkpoint sequencer (monotonic, concurrency-safe)
//! - The tracked replica whose mutations keep a change ledger current
//! - The rectifier (single-id and full-scan reconciliation)
//! - The replication orchestrator with chunked, sequential apply
//! - Explicit conflict objects the caller resolves
//!
//! ## Architecture
//!
//! Two independent stores converge by exchanging only deltas since a
//! prior synchronization point. Every tracked mutation updates a ledger
//! row holding the record's revision fingerprint and the checkpoint at
//! which it last changed. `replicate` reads both ledgers, classifies
//! ids into deltas and conflicts, and applies the deltas to the target
//! in sequential chunks.
//!
//! ## Key invariants
//!
//! - Exactly one checkpoint record exists per lineage
//! - Checkpoint sequences only advance; increments are atomic
//! - Conflicts are returned data, never errors, and never auto-resolved
//! - A failed chunk aborts the call; re-invoking with the same `since`
//!   is idempotent because classification recomputes from the ledger

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod checkpoint;
mod config;
mod conflict;
mod error;
mod rectify;
mod replica;
mod replicate;
mod store;

pub use checkpoint::CheckpointSequencer;
pub use config::{RectifyMode, ReplicationOptions};
pub use conflict::Conflict;
pub use error::{EngineError, EngineResult};
pub use rectify::RectifyRunner;
pub use replica::{ChangeFilter, TrackedReplica};
pub use replicate::{
    sync_pair, CheckpointPair, ReplicationOutcome, ReplicationPhase, ReplicationStats,
};
pub use store::{record_id, BulkUpdate, ChangeStore, CheckpointStore, Record, RecordStore};
