//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], a scratch directory that writes synthetic PCM
//! WAV files and builds job descriptors pointing into it.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use lamebatch::conversion::{CellId, JobDescriptor};
use lamebatch_encoder::EncoderConfig;
use tempfile::TempDir;

/// Scratch directory holding WAV inputs and MP3 outputs.
pub struct TestHarness {
    pub dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write a sine-tone WAV of `frames` frames and return its path.
    pub fn wav(&self, name: &str, channels: u16, bits: u16, frames: u32) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, wav_bytes(channels, bits, 44100, frames)).expect("failed to write wav");
        path
    }

    /// Write arbitrary bytes and return the path.
    pub fn raw(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, bytes).expect("failed to write file");
        path
    }

    /// Descriptor converting `input` into `out/<stem>_<row>_<column>.mp3`.
    pub fn job(&self, cell: CellId, input: &Path, options: &str) -> JobDescriptor {
        let stem = input.file_stem().unwrap().to_string_lossy();
        let output = self
            .dir
            .path()
            .join("out")
            .join(format!("{}_{}_{}.mp3", stem, cell.row, cell.column));
        JobDescriptor::new(cell, input, output, EncoderConfig::parse(options))
    }
}

/// Canonical 44-byte header followed by a sine tone.
pub fn wav_bytes(channels: u16, bits: u16, sample_rate: u32, frames: u32) -> Vec<u8> {
    let block_align = channels * (bits / 8);
    let data_size = frames * u32::from(block_align);

    let mut bytes = Vec::with_capacity(44 + data_size as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_size).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&bits.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_size.to_le_bytes());

    for n in 0..frames {
        let phase = n as f32 * 440.0 * std::f32::consts::TAU / sample_rate as f32;
        let value = phase.sin() * 0.5;
        for _ in 0..channels {
            if bits == 8 {
                bytes.push((128.0 + value * 127.0) as u8);
            } else {
                bytes.extend_from_slice(&((value * 32767.0) as i16).to_le_bytes());
            }
        }
    }
    bytes
}
