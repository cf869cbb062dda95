mod cli;

use lamebatch::{
    config,
    conversion::{
        BatchControl, BatchResult, JobDescriptor, JobStatus, ProgressEvent, ProgressObserver,
        Scheduler,
    },
};
use lamebatch_encoder::{EncoderConfig, EncoderSession};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "lamebatch=trace,lamebatch_encoder=debug,lamebatch_wav=debug".to_string()
        } else {
            "lamebatch=info,lamebatch_encoder=warn,lamebatch_wav=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Convert {
            project,
            jobs,
            progress_interval,
        } => convert(&project, jobs, progress_interval),
        Commands::Probe { file, json } => probe_file(&file, json),
        Commands::Validate { project } => validate_project(&project),
        Commands::Options { options } => check_options(&options),
    }
}

fn convert(project_path: &Path, jobs: Option<u16>, progress_interval: u64) -> Result<()> {
    let mut project = config::load_project(project_path)?;
    if let Some(jobs) = jobs {
        project.engine.max_parallel_jobs = usize::from(jobs);
    }

    let descriptors = project.descriptors();
    tracing::info!(
        "Converting {} files with {} settings ({} conversions)",
        project.files.len(),
        project.settings.len(),
        descriptors.len()
    );

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(run_batch(
        Scheduler::new(project.engine.clone()),
        descriptors,
        Duration::from_secs(progress_interval.max(1)),
    ))?;

    println!(
        "\n{} completed, {} failed, {} cancelled",
        result.completed(),
        result.failed(),
        result.aborted()
    );

    match result.failure() {
        None => Ok(()),
        Some(reason) => anyhow::bail!("Batch failed: {}", reason),
    }
}

async fn run_batch(
    scheduler: Scheduler,
    descriptors: Vec<JobDescriptor>,
    interval: Duration,
) -> Result<BatchResult> {
    let outputs: Arc<HashMap<_, _>> = Arc::new(
        descriptors
            .iter()
            .map(|d| (d.cell, d.output_path.clone()))
            .collect(),
    );

    let scheduler = scheduler.with_observer(ProgressObserver::new(move |event| {
        if let ProgressEvent::JobFinished { cell, outcome } = event {
            let output = outputs
                .get(cell)
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            match &outcome.status {
                JobStatus::Completed => println!("✓ {}", output),
                JobStatus::Aborted => println!("- {} (cancelled)", output),
                JobStatus::Failed(reason) => println!("✗ {}: {}", output, reason),
            }
        }
    }));

    let control = BatchControl::new();
    let batch_control = control.clone();
    let mut batch =
        tokio::task::spawn_blocking(move || scheduler.run_batch_with(descriptors, &batch_control));

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            result = &mut batch => return result.context("Batch worker panicked"),
            _ = ticker.tick() => {
                let progress = control.progress();
                if progress.total > 0 {
                    tracing::info!(
                        "Progress: {}/{} blocks ({:.1}%)",
                        progress.count,
                        progress.total,
                        progress.percent()
                    );
                }
            }
            signal = tokio::signal::ctrl_c(), if !control.is_cancelled() => {
                signal.context("Failed to listen for Ctrl-C")?;
                tracing::warn!("Interrupted, cancelling conversions");
                control.cancel();
            }
        }
    }
}

fn probe_file(file: &Path, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let header = lamebatch_wav::probe(file)?;

    if json {
        let json_str = serde_json::to_string_pretty(&header)?;
        println!("{}", json_str);
    } else {
        let secs = header.duration().as_secs();
        println!("File: {}", file.display());
        println!("Channels: {}", header.channels);
        println!("Bits per sample: {}", header.bits_per_sample);
        println!("Sample rate: {} Hz", header.sample_rate);
        println!("Data size: {} bytes", header.data_size);
        println!("Frames: {}", header.frame_count());
        println!("Blocks: {}", header.block_count());
        println!(
            "Duration: {:02}:{:02}:{:02}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        );
    }

    Ok(())
}

fn validate_project(path: &Path) -> Result<()> {
    println!("Validating project: {:?}", path);
    let project = config::load_project(path)?;

    println!("✓ Project is valid");
    println!("  Parallel jobs: {}", project.engine.max_parallel_jobs);
    println!("  Progress batch: {} blocks", project.engine.progress_batch);
    println!("  Settings: {}", project.settings.len());
    for setting in &project.settings {
        println!("    {}: {}", setting.name, setting.options);
    }
    println!("  Files: {}", project.files.len());
    println!("  Conversions: {}", project.cells().len());
    for job in project.descriptors() {
        println!(
            "    {} -> {}",
            job.input_path.display(),
            job.output_path.display()
        );
    }

    Ok(())
}

fn check_options(options: &str) -> Result<()> {
    let config = EncoderConfig::parse(options);
    let session = EncoderSession::with_config(&config)
        .with_context(|| format!("Options rejected: {}", options))?;

    println!("✓ Options accepted");
    for entry in &config {
        println!("  {}", entry);
    }
    println!("  Resolved: {}", session.params());

    Ok(())
}
