//! The rectifier: recomputes ledger rows against live data.
//!
//! Two paths exist. `rectify_change` recomputes one id and is O(1)
//! relative to collection size; every tracked mutation takes it. Bulk
//! operations whose affected id set is not enumerable ahead of time,
//! and any writer that bypasses the replica entirely, leave the ledger
//! stale; `rectify_all` walks the whole collection to reconcile it.

use crate::config::RectifyMode;
use crate::error::EngineResult;
use crate::replica::TrackedReplica;
use crate::store::record_id;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tidemark_ledger::{fingerprint, Change};
use tracing::{debug, warn};

impl TrackedReplica {
    /// Recomputes the ledger row for a single id.
    ///
    /// Reads the live record, fingerprints it, classifies the mutation
    /// against the prior row, and stamps the current checkpoint. Rows
    /// are only written when the revision actually changed. Returns
    /// true if the row was written.
    pub fn rectify_change(&self, model_id: &str) -> EngineResult<bool> {
        let seq = self.sequencer().current()?;
        self.rectify_one(model_id, seq)
    }

    fn rectify_one(&self, model_id: &str, seq: u64) -> EngineResult<bool> {
        let record = self.records().find_by_id(model_id)?;
        let rev = record.as_ref().map(fingerprint);

        let prior = self.ledger().get(self.model_name(), model_id)?;
        let mut change = match prior {
            Some(row) => row,
            // Nothing live and nothing tracked: no row to write.
            None if rev.is_none() => return Ok(false),
            None => Change::new(self.model_name(), model_id, seq),
        };

        if change.observe(rev, seq) {
            debug!(
                model = self.model_name(),
                id = model_id,
                kind = ?change.kind,
                checkpoint = seq,
                "rectified change"
            );
            self.ledger().put(change)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Reconciles the whole ledger against the live collection.
    ///
    /// Every live record is re-fingerprinted, and every ledger row
    /// whose id is no longer live is marked deleted. Returns the number
    /// of rows written.
    pub fn rectify_all(&self) -> EngineResult<usize> {
        let seq = self.sequencer().current()?;
        let mut touched = 0;

        let mut live = HashSet::new();
        for record in self.records().find_all()? {
            let id = record_id(&record)?;
            if self.rectify_one(&id, seq)? {
                touched += 1;
            }
            live.insert(id);
        }

        for row in self.ledger().all_for_model(self.model_name())? {
            if live.contains(&row.model_id) || row.is_deletion() {
                continue;
            }
            let mut row = row;
            if row.observe(None, seq) {
                self.ledger().put(row)?;
                touched += 1;
            }
        }

        debug!(
            model = self.model_name(),
            touched, "full ledger reconciliation finished"
        );
        Ok(touched)
    }

    /// Starts automatic reconciliation per the given mode.
    ///
    /// `Disabled` does nothing, `Once` runs a single pass inline, and
    /// `Every` spawns a background thread that reconciles at the given
    /// interval until the returned runner is stopped or dropped.
    pub fn start_auto_rectify(&self, mode: RectifyMode) -> EngineResult<Option<RectifyRunner>> {
        match mode {
            RectifyMode::Disabled => Ok(None),
            RectifyMode::Once => {
                self.rectify_all()?;
                Ok(None)
            }
            RectifyMode::Every(interval) => Ok(Some(RectifyRunner::spawn(self.clone(), interval))),
        }
    }
}

/// Handle to a background reconciliation thread.
///
/// Stopping (or dropping) the runner shuts the thread down.
pub struct RectifyRunner {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RectifyRunner {
    fn spawn(replica: TrackedReplica, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = std::thread::spawn(move || {
            const SLICE: Duration = Duration::from_millis(20);
            loop {
                // Sleep in slices so stop requests take effect promptly.
                let mut slept = Duration::ZERO;
                while slept < interval {
                    if stop_flag.load(Ordering::SeqCst) {
                        return;
                    }
                    let step = SLICE.min(interval - slept);
                    std::thread::sleep(step);
                    slept += step;
                }
                if stop_flag.load(Ordering::SeqCst) {
                    return;
                }
                if let Err(error) = replica.rectify_all() {
                    warn!(model = replica.model_name(), %error, "periodic reconciliation failed");
                }
            }
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stops the background thread and waits for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RectifyRunner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for RectifyRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RectifyRunner")
            .field("stopped", &self.stop.load(Ordering::SeqCst))
            .finish()
    }
}
