//! Block-wise sample reading.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use crate::header::{validate_header, WavHeader};
use crate::{Result, WavError, BLOCK_CAPACITY};

/// Two-lane buffer of 16-bit samples holding up to [`BLOCK_CAPACITY`] frames.
///
/// Lane 0 carries the left (or mono) channel, lane 1 the right channel. For
/// mono input lane 1 is left untouched.
#[derive(Debug, Clone)]
pub struct PcmBlock {
    lanes: [Vec<i16>; 2],
    frames: usize,
    raw: Vec<u8>,
}

impl PcmBlock {
    /// Create an empty block with full capacity allocated up front.
    pub fn new() -> Self {
        Self {
            lanes: [vec![0; BLOCK_CAPACITY], vec![0; BLOCK_CAPACITY]],
            frames: 0,
            raw: Vec::with_capacity(BLOCK_CAPACITY * 4),
        }
    }

    /// Number of valid frames in the block.
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Left (or mono) samples of the valid frames.
    pub fn left(&self) -> &[i16] {
        &self.lanes[0][..self.frames]
    }

    /// Right samples of the valid frames.
    pub fn right(&self) -> &[i16] {
        &self.lanes[1][..self.frames]
    }

    /// Fill the block from raw samples. Used by tests and callers that
    /// already hold decoded PCM.
    pub fn fill(&mut self, left: &[i16], right: &[i16]) -> Result<()> {
        let frames = left.len();
        if frames > BLOCK_CAPACITY {
            return Err(WavError::BlockOverflow {
                requested: frames,
                capacity: BLOCK_CAPACITY,
            });
        }
        self.lanes[0][..frames].copy_from_slice(left);
        let paired = right.len().min(frames);
        self.lanes[1][..paired].copy_from_slice(&right[..paired]);
        self.frames = frames;
        Ok(())
    }
}

impl Default for PcmBlock {
    fn default() -> Self {
        Self::new()
    }
}

/// Read exactly `max_frames` interleaved frames from `reader` into `block`.
///
/// 8-bit samples are unsigned and are widened as-is (0..=255, no
/// re-centering). 16-bit samples are signed little-endian. Running out of
/// input before `max_frames` frames are read is [`WavError::PrematureEof`].
pub fn read_block<R: Read>(
    reader: &mut R,
    header: &WavHeader,
    block: &mut PcmBlock,
    max_frames: usize,
) -> Result<()> {
    if max_frames > BLOCK_CAPACITY {
        return Err(WavError::BlockOverflow {
            requested: max_frames,
            capacity: BLOCK_CAPACITY,
        });
    }

    let byte_len = max_frames * header.block_align();
    block.raw.resize(byte_len, 0);
    reader.read_exact(&mut block.raw).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => WavError::PrematureEof,
        _ => WavError::Io(e),
    })?;

    let [left, right] = &mut block.lanes;
    match (header.bits_per_sample, header.channels) {
        (8, 1) => {
            for (sample, byte) in left.iter_mut().zip(&block.raw) {
                *sample = i16::from(*byte);
            }
        }
        (8, _) => {
            for (n, frame) in block.raw.chunks_exact(2).enumerate() {
                left[n] = i16::from(frame[0]);
                right[n] = i16::from(frame[1]);
            }
        }
        (_, 1) => {
            for (sample, bytes) in left.iter_mut().zip(block.raw.chunks_exact(2)) {
                *sample = i16::from_le_bytes([bytes[0], bytes[1]]);
            }
        }
        _ => {
            for (n, frame) in block.raw.chunks_exact(4).enumerate() {
                left[n] = i16::from_le_bytes([frame[0], frame[1]]);
                right[n] = i16::from_le_bytes([frame[2], frame[3]]);
            }
        }
    }
    block.frames = max_frames;

    Ok(())
}

/// Sequential block reader over a validated WAV stream.
///
/// # Example
///
/// ```no_run
/// use lamebatch_wav::{PcmBlock, WavReader};
///
/// let mut reader = WavReader::open("input.wav")?;
/// let mut block = PcmBlock::new();
/// while let Some(frames) = reader.next_block(&mut block)? {
///     println!("read {frames} frames");
/// }
/// # Ok::<(), lamebatch_wav::WavError>(())
/// ```
#[derive(Debug)]
pub struct WavReader<R> {
    inner: R,
    header: WavHeader,
    frames_remaining: u64,
}

impl WavReader<BufReader<File>> {
    /// Open a file and validate its header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read> WavReader<R> {
    /// Validate the header of `inner` and prepare to read its samples.
    pub fn new(mut inner: R) -> Result<Self> {
        let header = validate_header(&mut inner)?;
        Ok(Self {
            inner,
            frames_remaining: header.frame_count(),
            header,
        })
    }

    pub fn header(&self) -> &WavHeader {
        &self.header
    }

    /// Total number of blocks this stream yields.
    pub fn block_count(&self) -> u64 {
        self.header.block_count()
    }

    pub fn frames_remaining(&self) -> u64 {
        self.frames_remaining
    }

    /// Read the next block, returning the number of frames read or `None`
    /// once the payload is consumed. Every block but the last is full.
    pub fn next_block(&mut self, block: &mut PcmBlock) -> Result<Option<usize>> {
        if self.frames_remaining == 0 {
            return Ok(None);
        }
        let frames = self.frames_remaining.min(BLOCK_CAPACITY as u64) as usize;
        read_block(&mut self.inner, &self.header, block, frames)?;
        self.frames_remaining -= frames as u64;
        Ok(Some(frames))
    }
}
