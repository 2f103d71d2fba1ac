//! Checkpoint records.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// A named point in a model's change history.
///
/// At most one checkpoint record exists per tracked lineage; `seq` is
/// non-decreasing across the record's lifetime. The record is created
/// implicitly on first read, seeded at sequence 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Monotonic sequence number, starting at 1.
    pub seq: u64,
    /// Wall-clock time of the last sequence advance.
    pub time: SystemTime,
}

impl Checkpoint {
    /// The sequence value a fresh lineage is seeded with.
    pub const SEED: u64 = 1;

    /// Creates the seed checkpoint for a fresh lineage.
    pub fn seed() -> Self {
        Self {
            seq: Self::SEED,
            time: SystemTime::now(),
        }
    }

    /// Advances the sequence by one and stamps the current time.
    pub fn advance(&mut self) -> u64 {
        self.seq += 1;
        self.time = SystemTime::now();
        self.seq
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::seed()
    }
}
