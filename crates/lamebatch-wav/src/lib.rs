//! # lamebatch-wav
//!
//! Canonical PCM WAV reading for the lamebatch encoder.
//!
//! This crate provides:
//! - Strict header validation of uncompressed 8/16-bit mono/stereo WAV files
//! - A fixed-capacity two-lane sample block sized to one MP3 frame
//! - A sequential block reader that refuses to silently truncate input
//!
//! ## Example
//!
//! ```no_run
//! let header = lamebatch_wav::probe("/path/to/input.wav")?;
//! println!(
//!     "{} ch, {} bit, {} Hz, {} blocks",
//!     header.channels,
//!     header.bits_per_sample,
//!     header.sample_rate,
//!     header.block_count()
//! );
//! # Ok::<(), lamebatch_wav::WavError>(())
//! ```

mod block;
mod error;
mod header;

pub use block::{read_block, PcmBlock, WavReader};
pub use error::{Result, WavError};
pub use header::{validate_header, WavHeader};

/// Frames per block; one MPEG-1 Layer III frame.
pub const BLOCK_CAPACITY: usize = 1152;

/// Open a WAV file and return its validated header.
pub fn probe<P: AsRef<std::path::Path>>(path: P) -> Result<WavHeader> {
    let path = path.as_ref();
    let reader = WavReader::open(path)?;

    #[cfg(feature = "tracing")]
    tracing::debug!(
        "Probed {}: {:?}, {} blocks",
        path.display(),
        reader.header(),
        reader.block_count()
    );

    Ok(*reader.header())
}
