//! A single WAV to MP3 conversion.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use lamebatch_encoder::{EncoderConfig, EncoderError, EncoderSession};
use lamebatch_wav::{PcmBlock, WavError, WavReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn};

use super::progress::ProgressReporter;

/// Blocks encoded between two progress reports.
pub const DEFAULT_PROGRESS_BATCH: u64 = 100;

/// Reason recorded for jobs stopped by cancellation.
pub const CANCELLED_REASON: &str = "conversion cancelled";

/// Position of a job in the file × setting matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId {
    /// Input file index.
    pub row: usize,
    /// Encoder setting index.
    pub column: usize,
}

impl CellId {
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.column)
    }
}

/// Everything one job needs to run.
#[derive(Debug, Clone)]
pub struct JobDescriptor {
    pub cell: CellId,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub config: EncoderConfig,
}

impl JobDescriptor {
    pub fn new(
        cell: CellId,
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        config: EncoderConfig,
    ) -> Self {
        Self {
            cell,
            input_path: input_path.into(),
            output_path: output_path.into(),
            config,
        }
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    HeaderValidated,
    Converting,
    Flushing,
    Completed,
    Failed,
    Aborted,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Created, HeaderValidated) => true,
            (HeaderValidated, Converting) => true,
            (Converting, Flushing) => true,
            (Flushing, Completed | Aborted) => true,
            (Created | HeaderValidated | Converting | Flushing, Failed) => true,
            (Created | HeaderValidated, Aborted) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::HeaderValidated => "header-validated",
            Self::Converting => "converting",
            Self::Flushing => "flushing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Reasons a job fails.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Wav(#[from] WavError),

    #[error(transparent)]
    Encoder(#[from] EncoderError),

    #[error("failed to create output file {}: {source}", path.display())]
    CreateOutput { path: PathBuf, source: io::Error },

    #[error("failed to write output file {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

impl JobError {
    /// Whether the failure means no other job can succeed either.
    pub fn is_systemic(&self) -> bool {
        matches!(self, Self::Encoder(e) if e.is_systemic())
    }
}

/// Terminal status of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Completed,
    Failed(String),
    Aborted,
}

/// What a job reports once it stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub cell: CellId,
    pub status: JobStatus,
    pub blocks_encoded: u64,
    pub bytes_written: u64,
    /// Set when the failure should stop the whole batch.
    pub systemic: bool,
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == JobStatus::Completed
    }

    pub fn is_aborted(&self) -> bool {
        self.status == JobStatus::Aborted
    }

    /// Human-readable reason for a non-successful outcome.
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.status {
            JobStatus::Completed => None,
            JobStatus::Failed(reason) => Some(reason.as_str()),
            JobStatus::Aborted => Some(CANCELLED_REASON),
        }
    }
}

/// Shared inputs of every job in a batch.
#[derive(Debug, Clone)]
pub struct JobContext {
    /// Checked between blocks; once cancelled jobs stop after the current block.
    pub cancellation: CancellationToken,
    pub progress: ProgressReporter,
    /// Blocks encoded between two count increments.
    pub progress_batch: u64,
}

impl JobContext {
    pub fn new(progress: ProgressReporter) -> Self {
        Self {
            cancellation: CancellationToken::new(),
            progress,
            progress_batch: DEFAULT_PROGRESS_BATCH,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_progress_batch(mut self, blocks: u64) -> Self {
        self.progress_batch = blocks.max(1);
        self
    }
}

enum Finish {
    Completed,
    Aborted,
}

/// One conversion from a WAV file to an MP3 file.
///
/// The job owns its encoder session, PCM buffer and output file; none of
/// them outlive [`run`](Self::run).
#[derive(Debug)]
pub struct ConversionJob {
    descriptor: JobDescriptor,
    state: JobState,
    blocks_encoded: u64,
    bytes_written: u64,
    unreported: u64,
}

impl ConversionJob {
    pub fn new(descriptor: JobDescriptor) -> Self {
        Self {
            descriptor,
            state: JobState::Created,
            blocks_encoded: 0,
            bytes_written: 0,
            unreported: 0,
        }
    }

    pub fn descriptor(&self) -> &JobDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Run the conversion to a terminal state.
    pub fn run(mut self, ctx: &JobContext) -> JobOutcome {
        let cell = self.descriptor.cell;
        let span = info_span!(
            "job",
            %cell,
            input = %self.descriptor.input_path.display(),
            output = %self.descriptor.output_path.display()
        );
        let _enter = span.enter();

        let result = self.convert(ctx);
        ctx.progress.count_increment(cell, std::mem::take(&mut self.unreported));

        let (status, systemic) = match result {
            Ok(Finish::Completed) => {
                self.transition(JobState::Completed);
                info!(
                    "Converted {} blocks, {} bytes written",
                    self.blocks_encoded, self.bytes_written
                );
                (JobStatus::Completed, false)
            }
            Ok(Finish::Aborted) => {
                self.transition(JobState::Aborted);
                info!("Cancelled after {} blocks", self.blocks_encoded);
                (JobStatus::Aborted, false)
            }
            Err(e) => {
                self.transition(JobState::Failed);
                warn!("Conversion failed: {}", e);
                (JobStatus::Failed(e.to_string()), e.is_systemic())
            }
        };

        JobOutcome {
            cell,
            status,
            blocks_encoded: self.blocks_encoded,
            bytes_written: self.bytes_written,
            systemic,
        }
    }

    fn convert(&mut self, ctx: &JobContext) -> Result<Finish, JobError> {
        if ctx.cancellation.is_cancelled() {
            return Ok(Finish::Aborted);
        }

        let cell = self.descriptor.cell;
        let mut session = EncoderSession::with_config(&self.descriptor.config)?;

        let mut reader = WavReader::open(&self.descriptor.input_path)?;
        let header = *reader.header();
        self.transition(JobState::HeaderValidated);
        debug!(
            "Input: {} ch, {} bit, {} Hz, {} frames",
            header.channels,
            header.bits_per_sample,
            header.sample_rate,
            header.frame_count()
        );

        session.finalize_params(header.sample_rate, header.channels)?;
        debug!("Encoder: {}", session.params());

        ctx.progress.total_increment(cell, reader.block_count());

        if ctx.cancellation.is_cancelled() {
            return Ok(Finish::Aborted);
        }

        let output_path = self.descriptor.output_path.clone();
        let mut output = create_output(&output_path)?;
        let write_err = |source| JobError::Write {
            path: output_path.clone(),
            source,
        };
        self.transition(JobState::Converting);

        let mut block = PcmBlock::new();
        let mut cancelled = false;
        while reader.next_block(&mut block)?.is_some() {
            let encoded = session.encode_block(&block)?;
            output.write_all(encoded).map_err(write_err)?;
            self.bytes_written += encoded.len() as u64;
            self.blocks_encoded += 1;

            self.unreported += 1;
            if self.unreported >= ctx.progress_batch {
                ctx.progress
                    .count_increment(cell, std::mem::take(&mut self.unreported));
            }

            // A job that already read its last block runs to completion.
            if reader.frames_remaining() > 0 && ctx.cancellation.is_cancelled() {
                cancelled = true;
                break;
            }
        }

        self.transition(JobState::Flushing);
        let tail = session.flush()?;
        output.write_all(tail).map_err(write_err)?;
        self.bytes_written += tail.len() as u64;

        Ok(if cancelled {
            Finish::Aborted
        } else {
            Finish::Completed
        })
    }

    fn transition(&mut self, next: JobState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid job transition {} -> {}",
            self.state,
            next
        );
        debug!("{} -> {}", self.state, next);
        self.state = next;
    }
}

/// Create the output file. Writes are unbuffered so every encoded block
/// reaches the file before the next one is read.
fn create_output(path: &Path) -> Result<File, JobError> {
    let create_err = |source| JobError::CreateOutput {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(create_err)?;
    }
    File::create(path).map_err(create_err)
}

/// Run one job to completion with its own context.
pub fn run_job(descriptor: JobDescriptor, ctx: &JobContext) -> JobOutcome {
    ConversionJob::new(descriptor).run(ctx)
}
