//! # lamebatch-encoder
//!
//! Streaming MP3 encoding on top of LAME.
//!
//! An [`EncoderConfig`] is an ordered list of LAME command-line style
//! options. An [`EncoderSession`] owns one native encoder context, applies a
//! config to it, and then encodes [`PcmBlock`](lamebatch_wav::PcmBlock)s one
//! at a time.
//!
//! ## Example
//!
//! ```no_run
//! use lamebatch_encoder::{EncoderConfig, EncoderSession};
//! use lamebatch_wav::{PcmBlock, WavReader};
//!
//! let config = EncoderConfig::parse("-m j -V 2 --vbr-new");
//! let mut reader = WavReader::open("input.wav")?;
//! let header = *reader.header();
//!
//! let mut session = EncoderSession::with_config(&config)?;
//! session.finalize_params(header.sample_rate, header.channels)?;
//!
//! let mut mp3 = Vec::new();
//! let mut block = PcmBlock::new();
//! while reader.next_block(&mut block)?.is_some() {
//!     mp3.extend_from_slice(session.encode_block(&block)?);
//! }
//! mp3.extend_from_slice(session.flush()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod config;
mod error;
mod session;

pub use config::{EncoderConfig, OptionEntry};
pub use error::{EncoderError, Result};
pub use session::{
    normalize_bitrate, normalize_frequency, resample_rate, snap_bitrate, ChannelMode,
    EncoderParams, EncoderSession, RateControl, SessionState, FILTER_OFF, RESAMPLE_RATES,
    VALID_BITRATES,
};
