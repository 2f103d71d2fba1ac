//! # Tidemark Ledger
//!
//! Change ledger types and algorithms for tidemark replication.
//!
//! This crate provides:
//! - `Change` ledger rows with revision fingerprints
//! - `Checkpoint` sequence records
//! - The diff/classifier partitioning changes into deltas and conflicts
//! - Conflict classification and resolution strategies
//!
//! This is a pure data crate with no I/O operations. Store access and
//! the replication orchestrator live in `tidemark_engine`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change;
mod checkpoint;
mod conflict;
mod diff;
mod rev;

pub use change::{Change, ChangeKind};
pub use checkpoint::Checkpoint;
pub use conflict::{ConflictKind, Resolution};
pub use diff::{diff_changes, DiffResult};
pub use rev::fingerprint;
