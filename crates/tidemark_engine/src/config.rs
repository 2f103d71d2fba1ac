//! Configuration for replication and rectification.
//!
//! Configuration values are plain immutable structs passed in at
//! construction or call time; the engine never mutates them in place.

use crate::replica::ChangeFilter;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Per-call options for `TrackedReplica::replicate`.
#[derive(Clone, Default)]
pub struct ReplicationOptions {
    /// Maximum number of records applied to the target per bulk-apply
    /// call. `None` applies everything in a single chunk.
    pub chunk_size: Option<usize>,
    /// Additional change filter, merged with the checkpoint and model
    /// predicates (never replacing them).
    pub filter: Option<Arc<ChangeFilter>>,
}

impl ReplicationOptions {
    /// Creates options with defaults: unbounded chunks, no filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the replication chunk size.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size);
        self
    }

    /// Sets an additional change filter.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&tidemark_ledger::Change) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }
}

impl fmt::Debug for ReplicationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicationOptions")
            .field("chunk_size", &self.chunk_size)
            .field("filter", &self.filter.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// When the engine runs full-ledger reconciliation on its own.
///
/// Out-of-band writers (direct admin writes, foreign connectors) can
/// mutate the underlying store without firing the tracked mutation
/// entry points; periodic reconciliation is the safety net for those.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RectifyMode {
    /// Never reconcile automatically.
    Disabled,
    /// One full pass when tracking is enabled, then never again.
    Once,
    /// A full pass at the given interval on a background thread.
    Every(Duration),
}

impl RectifyMode {
    /// Maps the legacy millisecond-interval setting onto a mode:
    /// a negative interval disables reconciliation, an unset interval
    /// runs a single pass, and a positive interval runs periodically.
    pub fn from_interval_ms(interval: Option<i64>) -> Self {
        match interval {
            Some(ms) if ms < 0 => RectifyMode::Disabled,
            Some(ms) => RectifyMode::Every(Duration::from_millis(ms as u64)),
            None => RectifyMode::Once,
        }
    }
}
