//! The checkpoint sequencer.

use crate::error::EngineResult;
use crate::store::CheckpointStore;
use std::sync::Arc;

/// A monotonic sequence generator over a singleton checkpoint record.
///
/// The sequencer is a thin façade over the store's atomic primitives:
/// both reads and increments go straight to the store, so every
/// sequencer sharing one `CheckpointStore` observes one timeline.
/// Multiple tracked replicas intentionally share a sequencer when their
/// histories must advance together.
#[derive(Clone)]
pub struct CheckpointSequencer {
    store: Arc<dyn CheckpointStore>,
}

impl CheckpointSequencer {
    /// Creates a sequencer over the given store.
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self { store }
    }

    /// Returns the current sequence value.
    ///
    /// Creates the singleton record seeded at 1 if it does not exist
    /// yet, so a fresh lineage always reads 1.
    pub fn current(&self) -> EngineResult<u64> {
        Ok(self.store.init()?.seq)
    }

    /// Atomically advances the sequence and returns the new value.
    ///
    /// On a fresh lineage the seed record is created first, so the
    /// first bump returns 2. Two concurrent bumps never observe the
    /// same new value; atomicity is delegated to the store.
    pub fn bump_last_seq(&self) -> EngineResult<u64> {
        self.store.increment()
    }
}

impl std::fmt::Debug for CheckpointSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointSequencer").finish_non_exhaustive()
    }
}
