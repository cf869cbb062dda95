//! Fan-out of conversion jobs onto a worker pool.

use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span};

use super::job::{run_job, CellId, JobContext, JobDescriptor, JobOutcome};
use super::progress::{ProgressObserver, ProgressReporter, ProgressSnapshot, ProgressTotals};
use crate::config::EngineConfig;

/// Overall status of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchStatus {
    /// Every job completed.
    Ok,
    /// The first failure reason, or the systemic failure that stopped the batch.
    Failed(String),
}

/// Per-job outcomes of a batch, in completion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub status: BatchStatus,
    pub outcomes: Vec<JobOutcome>,
}

impl BatchResult {
    /// Summarise outcomes listed in completion order.
    ///
    /// A systemic failure takes precedence over any earlier job failure.
    pub fn from_outcomes(outcomes: Vec<JobOutcome>) -> Self {
        let systemic = outcomes
            .iter()
            .find(|o| o.systemic)
            .and_then(JobOutcome::failure_reason);
        let first = outcomes.iter().find_map(JobOutcome::failure_reason);
        let status = match systemic.or(first) {
            Some(reason) => BatchStatus::Failed(reason.to_string()),
            None => BatchStatus::Ok,
        };
        Self { status, outcomes }
    }

    /// A batch that never started any job.
    pub fn not_started(reason: impl Into<String>) -> Self {
        Self {
            status: BatchStatus::Failed(reason.into()),
            outcomes: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == BatchStatus::Ok
    }

    pub fn failure(&self) -> Option<&str> {
        match &self.status {
            BatchStatus::Ok => None,
            BatchStatus::Failed(reason) => Some(reason.as_str()),
        }
    }

    pub fn outcome(&self, cell: CellId) -> Option<&JobOutcome> {
        self.outcomes.iter().find(|o| o.cell == cell)
    }

    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_completed()).count()
    }

    pub fn aborted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_aborted()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.completed() - self.aborted()
    }
}

/// Cancellation and progress of one batch, shareable with other threads.
#[derive(Debug, Clone, Default)]
pub struct BatchControl {
    cancellation: CancellationToken,
    totals: Arc<ProgressTotals>,
}

impl BatchControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every job to stop after its current block.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.totals.snapshot()
    }
}

/// Runs batches of conversion jobs on a bounded worker pool.
#[derive(Debug, Clone)]
pub struct Scheduler {
    config: EngineConfig,
    observer: Arc<ProgressObserver>,
}

impl Scheduler {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            observer: Arc::new(ProgressObserver::noop()),
        }
    }

    /// Builder: attach a progress observer.
    pub fn with_observer(mut self, observer: ProgressObserver) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run every job and block until all of them reached a terminal state.
    pub fn run_batch(&self, jobs: Vec<JobDescriptor>) -> BatchResult {
        self.run_batch_with(jobs, &BatchControl::new())
    }

    /// Like [`run_batch`](Self::run_batch), reporting into and obeying `control`.
    pub fn run_batch_with(&self, jobs: Vec<JobDescriptor>, control: &BatchControl) -> BatchResult {
        let span = info_span!("batch", jobs = jobs.len());
        let _enter = span.enter();

        let workers = self.config.worker_count();
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("lamebatch-worker-{i}"))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                error!("Failed to start worker pool: {}", e);
                return BatchResult::not_started(format!("failed to start worker pool: {e}"));
            }
        };

        info!("Starting {} conversions on {} workers", jobs.len(), workers);

        let reporter = ProgressReporter::new(Arc::clone(&control.totals), Arc::clone(&self.observer));
        let ctx = JobContext::new(reporter)
            .with_cancellation(control.cancellation_token())
            .with_progress_batch(self.config.progress_batch);
        let outcomes = Mutex::new(Vec::with_capacity(jobs.len()));

        pool.scope(|scope| {
            for descriptor in jobs {
                let ctx = &ctx;
                let outcomes = &outcomes;
                let parent = span.clone();
                scope.spawn(move |_| {
                    let _enter = parent.enter();
                    let outcome = run_job(descriptor, ctx);
                    if outcome.systemic && !ctx.cancellation.is_cancelled() {
                        error!(
                            "Systemic failure in job {}, cancelling batch",
                            outcome.cell
                        );
                        ctx.cancellation.cancel();
                    }
                    ctx.progress.job_finished(&outcome);
                    outcomes.lock().push(outcome);
                });
            }
        });

        let result = BatchResult::from_outcomes(outcomes.into_inner());
        info!(
            "Batch finished: {} completed, {} failed, {} aborted",
            result.completed(),
            result.failed(),
            result.aborted()
        );
        result
    }

    /// Run the batch on a background thread and return immediately.
    pub fn spawn_batch(&self, jobs: Vec<JobDescriptor>) -> std::io::Result<BatchHandle> {
        let control = BatchControl::new();
        let scheduler = self.clone();
        let thread_control = control.clone();
        let thread = std::thread::Builder::new()
            .name("lamebatch-batch".to_string())
            .spawn(move || scheduler.run_batch_with(jobs, &thread_control))?;
        Ok(BatchHandle { control, thread })
    }
}

/// A batch running on a background thread.
#[derive(Debug)]
pub struct BatchHandle {
    control: BatchControl,
    thread: JoinHandle<BatchResult>,
}

impl BatchHandle {
    pub fn progress(&self) -> ProgressSnapshot {
        self.control.progress()
    }

    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub fn control(&self) -> &BatchControl {
        &self.control
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the batch to finish.
    pub fn join(self) -> BatchResult {
        self.thread
            .join()
            .unwrap_or_else(|_| BatchResult::not_started("batch thread panicked"))
    }
}
