//! Batch-wide progress aggregation.
//!
//! Every job of a batch reports into one shared [`ProgressTotals`]: once with
//! the number of blocks it will encode, then in increments of completed
//! blocks. Counters are atomics so concurrent jobs never lose updates.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::job::{CellId, JobOutcome};

/// Progress notification emitted by a running job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A job learned how many blocks it will encode.
    TotalIncrement { cell: CellId, blocks: u64 },
    /// A job finished encoding `blocks` more blocks.
    CountIncrement { cell: CellId, blocks: u64 },
    /// A job reached a terminal state.
    JobFinished { cell: CellId, outcome: JobOutcome },
}

/// Shared grand total and grand count of one batch.
#[derive(Debug, Default)]
pub struct ProgressTotals {
    grand_total: AtomicU64,
    grand_count: AtomicU64,
    jobs_finished: AtomicU64,
}

impl ProgressTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_total(&self, blocks: u64) {
        self.grand_total.fetch_add(blocks, Ordering::Relaxed);
    }

    pub fn add_count(&self, blocks: u64) {
        self.grand_count.fetch_add(blocks, Ordering::Relaxed);
    }

    pub fn finish_job(&self) {
        self.jobs_finished.fetch_add(1, Ordering::Relaxed);
    }

    /// Non-blocking point-in-time view of the counters.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.grand_total.load(Ordering::Relaxed),
            count: self.grand_count.load(Ordering::Relaxed),
            jobs_finished: self.jobs_finished.load(Ordering::Relaxed),
        }
    }
}

/// Copy of the counters at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total: u64,
    pub count: u64,
    pub jobs_finished: u64,
}

impl ProgressSnapshot {
    /// Completed fraction in `0.0..=1.0`; zero until any total is known.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.count as f64 / self.total as f64).min(1.0)
        }
    }

    pub fn percent(&self) -> f64 {
        self.fraction() * 100.0
    }
}

/// Callback receiving every [`ProgressEvent`] of a batch.
///
/// Called from worker threads, so it must be cheap and thread-safe.
pub struct ProgressObserver {
    callback: Box<dyn Fn(&ProgressEvent) + Send + Sync>,
}

impl ProgressObserver {
    pub fn new(callback: impl Fn(&ProgressEvent) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Observer that discards all events.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_| {}),
        }
    }

    pub fn notify(&self, event: &ProgressEvent) {
        (self.callback)(event);
    }
}

impl Default for ProgressObserver {
    fn default() -> Self {
        Self::noop()
    }
}

impl std::fmt::Debug for ProgressObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressObserver").finish_non_exhaustive()
    }
}

/// Handle jobs use to report progress: updates the totals, then notifies
/// the observer.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    totals: Arc<ProgressTotals>,
    observer: Arc<ProgressObserver>,
}

impl ProgressReporter {
    pub fn new(totals: Arc<ProgressTotals>, observer: Arc<ProgressObserver>) -> Self {
        Self { totals, observer }
    }

    /// Reporter with fresh totals and no observer.
    pub fn detached() -> Self {
        Self::new(Arc::default(), Arc::new(ProgressObserver::noop()))
    }

    pub fn totals(&self) -> &ProgressTotals {
        &self.totals
    }

    pub fn total_increment(&self, cell: CellId, blocks: u64) {
        self.totals.add_total(blocks);
        self.observer
            .notify(&ProgressEvent::TotalIncrement { cell, blocks });
    }

    pub fn count_increment(&self, cell: CellId, blocks: u64) {
        if blocks == 0 {
            return;
        }
        self.totals.add_count(blocks);
        self.observer
            .notify(&ProgressEvent::CountIncrement { cell, blocks });
    }

    pub fn job_finished(&self, outcome: &JobOutcome) {
        self.totals.finish_job();
        self.observer.notify(&ProgressEvent::JobFinished {
            cell: outcome.cell,
            outcome: outcome.clone(),
        });
    }
}
