//! Benchmarks for batch conversion
//!
//! Measures end-to-end throughput of the scheduler for different pool sizes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lamebatch::config::EngineConfig;
use lamebatch::conversion::{CellId, JobDescriptor, Scheduler};
use lamebatch_encoder::EncoderConfig;
use std::path::Path;
use std::time::Duration;

const JOBS: usize = 8;
const FRAMES: u32 = 44_100 * 2;

fn write_tone(path: &Path) {
    let data_size = FRAMES * 4;
    let mut bytes = Vec::with_capacity(44 + data_size as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_size).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&44_100u32.to_le_bytes());
    bytes.extend_from_slice(&(44_100u32 * 4).to_le_bytes());
    bytes.extend_from_slice(&4u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_size.to_le_bytes());
    for n in 0..FRAMES {
        let sample = ((n as f32 * 0.0627).sin() * 12_000.0) as i16;
        bytes.extend_from_slice(&sample.to_le_bytes());
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    std::fs::write(path, bytes).unwrap();
}

fn bench_scheduler(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("tone.wav");
    write_tone(&input);

    let jobs: Vec<JobDescriptor> = (0..JOBS)
        .map(|row| {
            JobDescriptor::new(
                CellId::new(row, 0),
                &input,
                dir.path().join(format!("out{row}.mp3")),
                EncoderConfig::parse("-m j -b 128"),
            )
        })
        .collect();

    let mut group = c.benchmark_group("run_batch");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(20));
    group.throughput(Throughput::Elements(JOBS as u64));

    for workers in [1usize, 2, 4] {
        let scheduler = Scheduler::new(EngineConfig {
            max_parallel_jobs: workers,
            progress_batch: 100,
        });
        group.bench_with_input(BenchmarkId::new("workers", workers), &jobs, |b, jobs| {
            b.iter(|| {
                let result = scheduler.run_batch(jobs.clone());
                assert!(result.is_ok());
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_scheduler);
criterion_main!(benches);
