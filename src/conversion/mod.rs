//! Batch conversion engine.
//!
//! A batch is a set of independent WAV to MP3 jobs, one per selected
//! (file, setting) cell of a project. This module provides:
//!
//! - The per-job state machine that reads, encodes and writes block by block
//! - A scheduler that runs jobs on a bounded worker pool
//! - Batch-wide progress aggregation and cooperative cancellation
//!
//! # Cancellation
//!
//! Cancelling a batch never interrupts a block. Every job checks the shared
//! token after each block; a job that sees it flushes its encoder, closes its
//! output and ends as aborted. Jobs that had not started end as aborted
//! without creating output.

mod job;
mod progress;
mod scheduler;

pub use job::{
    run_job, CellId, ConversionJob, JobContext, JobDescriptor, JobError, JobOutcome, JobState,
    JobStatus, CANCELLED_REASON, DEFAULT_PROGRESS_BATCH,
};
pub use progress::{
    ProgressEvent, ProgressObserver, ProgressReporter, ProgressSnapshot, ProgressTotals,
};
pub use scheduler::{BatchControl, BatchHandle, BatchResult, BatchStatus, Scheduler};
