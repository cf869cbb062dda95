//! RIFF/WAVE header validation.
//!
//! Only the canonical 44-byte layout is accepted: a `RIFF` container holding
//! `WAVE`, a 16-byte `fmt ` chunk with compression code 1, then the `data`
//! chunk. Every field is decoded from raw little-endian bytes.

use std::io::{self, Read};
use std::time::Duration;

use crate::{Result, WavError, BLOCK_CAPACITY};

/// Size of the only `fmt ` chunk layout we accept.
const PCM_FMT_SIZE: u32 = 16;

/// Compression code for uncompressed integer PCM.
const PCM_COMPRESSION: u16 = 1;

/// Validated properties of a PCM WAV stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct WavHeader {
    /// Number of interleaved channels (1 or 2).
    pub channels: u16,
    /// Bits per sample (8 or 16).
    pub bits_per_sample: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Declared size of the sample payload in bytes.
    pub data_size: u32,
}

impl WavHeader {
    /// Bytes per sample of one channel.
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    /// Bytes per frame (one sample for every channel).
    pub fn block_align(&self) -> usize {
        usize::from(self.channels) * self.bytes_per_sample()
    }

    /// Number of whole frames in the payload. A trailing partial frame is ignored.
    pub fn frame_count(&self) -> u64 {
        u64::from(self.data_size) / self.block_align() as u64
    }

    /// Number of blocks of [`BLOCK_CAPACITY`] frames needed for the payload.
    pub fn block_count(&self) -> u64 {
        self.frame_count().div_ceil(BLOCK_CAPACITY as u64)
    }

    /// Playback duration of the payload.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / f64::from(self.sample_rate))
    }
}

/// Read and validate a WAV header, leaving `reader` at the first sample.
///
/// Checks run in file order and the first mismatch is reported:
/// `RIFF` tag, `WAVE` tag, `fmt ` tag, format chunk size of 16, compression
/// code 1, channel count, bit depth and finally the `data` tag. The RIFF size
/// field is read but not checked against the real file length.
pub fn validate_header<R: Read>(reader: &mut R) -> Result<WavHeader> {
    expect_tag(reader, b"RIFF")?;
    let _riff_size = read_u32(reader)?;
    expect_tag(reader, b"WAVE")?;
    expect_tag(reader, b"fmt ")?;

    let fmt_size = read_u32(reader)?;
    if fmt_size != PCM_FMT_SIZE {
        return Err(WavError::invalid(format!(
            "format chunk size is {fmt_size}, expected {PCM_FMT_SIZE}"
        )));
    }

    let mut fmt = [0u8; PCM_FMT_SIZE as usize];
    read_header_bytes(reader, &mut fmt)?;

    let compression = u16::from_le_bytes([fmt[0], fmt[1]]);
    if compression != PCM_COMPRESSION {
        return Err(WavError::invalid(format!(
            "compression code {compression} is not PCM"
        )));
    }

    let channels = u16::from_le_bytes([fmt[2], fmt[3]]);
    let sample_rate = u32::from_le_bytes([fmt[4], fmt[5], fmt[6], fmt[7]]);
    // Byte rate (8..12) and block align (12..14) are derived values; skip them.
    let bits_per_sample = u16::from_le_bytes([fmt[14], fmt[15]]);

    if channels != 1 && channels != 2 {
        return Err(WavError::invalid(format!(
            "{channels} channels not supported"
        )));
    }
    if bits_per_sample != 8 && bits_per_sample != 16 {
        return Err(WavError::invalid(format!(
            "{bits_per_sample}-bit samples not supported"
        )));
    }

    expect_tag(reader, b"data")?;
    let data_size = read_u32(reader)?;

    Ok(WavHeader {
        channels,
        bits_per_sample,
        sample_rate,
        data_size,
    })
}

fn expect_tag<R: Read>(reader: &mut R, expected: &[u8; 4]) -> Result<()> {
    let mut tag = [0u8; 4];
    read_header_bytes(reader, &mut tag)?;
    if &tag != expected {
        return Err(WavError::invalid(format!(
            "expected '{}' tag, found '{}'",
            String::from_utf8_lossy(expected),
            String::from_utf8_lossy(&tag).escape_default()
        )));
    }
    Ok(())
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut bytes = [0u8; 4];
    read_header_bytes(reader, &mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

/// A header cut short is an invalid file rather than an I/O failure.
fn read_header_bytes<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => WavError::invalid("truncated header"),
        _ => WavError::Io(e),
    })
}
