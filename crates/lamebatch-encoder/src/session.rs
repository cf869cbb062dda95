//! Encoder sessions wrapping one native LAME context.

use std::fmt;
use std::num::NonZeroU32;
use std::os::raw::c_int;

use lamebatch_wav::{PcmBlock, BLOCK_CAPACITY};
use mp3lame_encoder::{
    ffi, Bitrate, Builder, DualPcm, Encoder, FlushNoGap, Mode, MonoPcm, Quality, VbrMode,
};

use crate::config::{EncoderConfig, OptionEntry};
use crate::{EncoderError, Result};

/// Bitrates (kbps) an MPEG-1/2 Layer III stream can carry.
pub const VALID_BITRATES: [u16; 16] = [
    8, 16, 24, 32, 40, 48, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320,
];

/// Output sample rates accepted by `--resample`, keyed by their kHz token.
pub const RESAMPLE_RATES: [(&str, u32); 11] = [
    ("8", 8000),
    ("11.025", 11025),
    ("11", 11025),
    ("12", 12000),
    ("16", 16000),
    ("22.05", 22050),
    ("22", 22050),
    ("24", 24000),
    ("32", 32000),
    ("44.1", 44100),
    ("48", 48000),
];

/// Highest cut-off or limit frequency, in Hz.
const MAX_FREQUENCY_HZ: f32 = 50_000.0;

/// Filter setting that switches the filter off.
pub const FILTER_OFF: i32 = -1;

/// Stereo coding mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Mono,
    Stereo,
    JointStereo,
    DualChannel,
}

impl ChannelMode {
    fn to_lame(self) -> Mode {
        match self {
            Self::Mono => Mode::Mono,
            Self::Stereo => Mode::Stereo,
            Self::JointStereo => Mode::JointStereo,
            Self::DualChannel => Mode::DaulChannel,
        }
    }
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mono => "mono",
            Self::Stereo => "stereo",
            Self::JointStereo => "joint-stereo",
            Self::DualChannel => "dual-channel",
        })
    }
}

/// Bitrate control strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateControl {
    #[default]
    Cbr,
    Vbr,
    Abr,
}

impl RateControl {
    fn to_lame(self) -> VbrMode {
        match self {
            Self::Cbr => VbrMode::Off,
            Self::Vbr => VbrMode::Mtrh,
            Self::Abr => VbrMode::Abr,
        }
    }
}

impl fmt::Display for RateControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cbr => "cbr",
            Self::Vbr => "vbr",
            Self::Abr => "abr",
        })
    }
}

/// Parameters explicitly set on a session. `None` leaves the encoder default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncoderParams {
    pub mode: Option<ChannelMode>,
    pub rate_control: RateControl,
    pub vbr_quality: Option<u8>,
    /// CBR bitrate (and VBR minimum), or the mean bitrate under ABR.
    pub bitrate_kbps: Option<u16>,
    pub vbr_max_kbps: Option<u16>,
    pub quality: Option<u8>,
    /// Mid/side coding on every frame (`-m f`).
    pub force_ms: bool,
    /// Filter frequencies in Hz; [`FILTER_OFF`] disables a filter.
    pub lowpass_hz: Option<i32>,
    pub lowpass_width_hz: Option<i32>,
    pub highpass_hz: Option<i32>,
    pub highpass_width_hz: Option<i32>,
    pub cwlimit_hz: Option<i32>,
    pub resample_hz: Option<u32>,
    pub quant_comp: Option<i32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

impl fmt::Display for EncoderParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rate_control)?;
        if let Some(q) = self.vbr_quality {
            write!(f, " V{q}")?;
        }
        if let Some(kbps) = self.bitrate_kbps {
            write!(f, " {kbps}kbps")?;
        }
        if let Some(kbps) = self.vbr_max_kbps {
            write!(f, " max {kbps}kbps")?;
        }
        if let Some(mode) = self.mode {
            write!(f, " {mode}")?;
        }
        if self.force_ms {
            f.write_str(" forced-ms")?;
        }
        if let Some(q) = self.quality {
            write!(f, " q{q}")?;
        }
        for (name, hz) in [("lowpass", self.lowpass_hz), ("highpass", self.highpass_hz)] {
            match hz {
                Some(FILTER_OFF) => write!(f, " {name} off")?,
                Some(hz) => write!(f, " {name} {hz}Hz")?,
                None => {}
            }
        }
        if let Some(hz) = self.resample_hz {
            write!(f, " resample {hz}Hz")?;
        }
        if let (Some(rate), Some(channels)) = (self.sample_rate, self.channels) {
            write!(f, " {rate}Hz/{channels}ch")?;
        }
        Ok(())
    }
}

/// Externally visible lifecycle stage of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting options.
    Configuring,
    /// Parameters finalized; accepting blocks.
    Encoding,
    /// Drained and the native context released; no further calls are valid.
    Flushed,
    /// Parameter finalization failed; the native context is gone.
    Failed,
}

enum Stage {
    Configuring(Builder),
    Encoding(Encoder),
    Flushed,
    Failed,
}

/// One streaming MP3 encoder.
///
/// A session moves through a fixed lifecycle: options are applied with
/// [`apply`](Self::apply), the input format is fixed with
/// [`finalize_params`](Self::finalize_params), blocks are encoded in order
/// and the stream is drained by exactly one [`flush`](Self::flush). Calls out
/// of order fail with [`EncoderError::Misuse`].
///
/// The native context is owned by the session. It is released by a
/// successful or failed flush, or when the session is dropped, whichever
/// comes first.
pub struct EncoderSession {
    stage: Stage,
    params: EncoderParams,
    buffer: Vec<u8>,
}

impl EncoderSession {
    /// Allocate a fresh native context with LAME defaults.
    pub fn new() -> Result<Self> {
        let builder = Builder::new().ok_or(EncoderError::Allocation)?;
        Ok(Self {
            stage: Stage::Configuring(builder),
            params: EncoderParams::default(),
            buffer: Vec::new(),
        })
    }

    /// Allocate a session and apply `config` to it.
    pub fn with_config(config: &EncoderConfig) -> Result<Self> {
        let mut session = Self::new()?;
        session.apply(config)?;
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        match self.stage {
            Stage::Configuring(_) => SessionState::Configuring,
            Stage::Encoding(_) => SessionState::Encoding,
            Stage::Flushed => SessionState::Flushed,
            Stage::Failed => SessionState::Failed,
        }
    }

    /// Parameters set so far.
    pub fn params(&self) -> &EncoderParams {
        &self.params
    }

    /// Apply every entry of `config` in order, stopping at the first entry
    /// that cannot be applied.
    pub fn apply(&mut self, config: &EncoderConfig) -> Result<()> {
        for entry in config {
            self.apply_entry(entry)?;
        }
        Ok(())
    }

    /// Apply a single option entry.
    pub fn apply_entry(&mut self, entry: &OptionEntry) -> Result<()> {
        let Self { stage, params, .. } = self;
        let Stage::Configuring(builder) = stage else {
            return Err(EncoderError::Misuse(
                "options applied after parameters were finalized",
            ));
        };

        let option = entry.to_string();
        let setter = |e: mp3lame_encoder::BuildError| EncoderError::config(&option, format!("{e:?}"));
        let raw = |code: c_int| {
            EncoderError::config(&option, format!("rejected by LAME (code {code})"))
        };

        match entry.keyword.as_str() {
            "-m" => {
                let mode = match required_value(entry)? {
                    "m" => ChannelMode::Mono,
                    "s" => ChannelMode::Stereo,
                    "j" | "a" => ChannelMode::JointStereo,
                    "f" => {
                        set_raw(builder, ffi::lame_set_force_ms, 1).map_err(raw)?;
                        params.force_ms = true;
                        ChannelMode::JointStereo
                    }
                    "d" => ChannelMode::DualChannel,
                    other => {
                        return Err(EncoderError::config(
                            &option,
                            format!("unknown channel mode '{other}'"),
                        ))
                    }
                };
                builder.set_mode(mode.to_lame()).map_err(setter)?;
                params.mode = Some(mode);
            }
            "-V" => {
                let level = clamp_level(integer_value(entry)?);
                if params.rate_control == RateControl::Cbr {
                    builder.set_vbr_mode(RateControl::Vbr.to_lame()).map_err(setter)?;
                    params.rate_control = RateControl::Vbr;
                }
                builder.set_vbr_quality(quality(level)).map_err(setter)?;
                params.vbr_quality = Some(level);
            }
            "--vbr-new" | "--vbr-old" | "-v" => {
                builder.set_vbr_mode(RateControl::Vbr.to_lame()).map_err(setter)?;
                params.rate_control = RateControl::Vbr;
            }
            "-b" => {
                let kbps = snap_bitrate(normalize_bitrate(integer_value(entry)?));
                builder.set_brate(bitrate(kbps)).map_err(setter)?;
                set_raw(builder, ffi::lame_set_VBR_min_bitrate_kbps, c_int::from(kbps))
                    .map_err(raw)?;
                params.bitrate_kbps = Some(kbps);
            }
            "-B" => {
                let kbps = snap_bitrate(normalize_bitrate(integer_value(entry)?));
                set_raw(builder, ffi::lame_set_VBR_max_bitrate_kbps, c_int::from(kbps))
                    .map_err(raw)?;
                params.vbr_max_kbps = Some(kbps);
            }
            "--abr" => {
                // Any mean inside the range is valid; ABR does not snap.
                let kbps = normalize_bitrate(integer_value(entry)?);
                builder.set_vbr_mode(RateControl::Abr.to_lame()).map_err(setter)?;
                set_raw(builder, ffi::lame_set_VBR_mean_bitrate_kbps, c_int::from(kbps))
                    .map_err(raw)?;
                params.rate_control = RateControl::Abr;
                params.bitrate_kbps = Some(kbps);
            }
            "--cbr" => {
                builder.set_vbr_mode(RateControl::Cbr.to_lame()).map_err(setter)?;
                params.rate_control = RateControl::Cbr;
            }
            "-q" => {
                let level = clamp_level(integer_value(entry)?);
                builder.set_quality(quality(level)).map_err(setter)?;
                params.quality = Some(level);
            }
            "--preset" => {
                let (rate_control, vbr_quality, kbps) = match required_value(entry)? {
                    "standard" => (RateControl::Vbr, Some(2), None),
                    "medium" => (RateControl::Vbr, Some(4), None),
                    "extreme" => (RateControl::Vbr, Some(0), None),
                    "insane" => (RateControl::Cbr, None, Some(320)),
                    other => {
                        return Err(EncoderError::config(
                            &option,
                            format!("unknown preset '{other}'"),
                        ))
                    }
                };
                builder.set_vbr_mode(rate_control.to_lame()).map_err(setter)?;
                params.rate_control = rate_control;
                if let Some(level) = vbr_quality {
                    builder.set_vbr_quality(quality(level)).map_err(setter)?;
                    params.vbr_quality = Some(level);
                }
                if let Some(kbps) = kbps {
                    builder.set_brate(bitrate(kbps)).map_err(setter)?;
                    params.bitrate_kbps = Some(kbps);
                }
            }
            "-k" => {
                set_raw(builder, ffi::lame_set_lowpassfreq, FILTER_OFF).map_err(raw)?;
                set_raw(builder, ffi::lame_set_highpassfreq, FILTER_OFF).map_err(raw)?;
                params.lowpass_hz = Some(FILTER_OFF);
                params.highpass_hz = Some(FILTER_OFF);
            }
            "--lowpass" => {
                let hz = normalize_frequency(float_value(entry)?, 50.0);
                set_raw(builder, ffi::lame_set_lowpassfreq, hz).map_err(raw)?;
                params.lowpass_hz = Some(hz);
            }
            "--highpass" => {
                let hz = normalize_frequency(float_value(entry)?, 16.0);
                set_raw(builder, ffi::lame_set_highpassfreq, hz).map_err(raw)?;
                params.highpass_hz = Some(hz);
            }
            "--lowpass-width" => {
                let hz = khz_to_hz(float_value(entry)?);
                set_raw(builder, ffi::lame_set_lowpasswidth, hz).map_err(raw)?;
                params.lowpass_width_hz = Some(hz);
            }
            "--highpass-width" => {
                let hz = khz_to_hz(float_value(entry)?);
                set_raw(builder, ffi::lame_set_highpasswidth, hz).map_err(raw)?;
                params.highpass_width_hz = Some(hz);
            }
            "--cwlimit" => {
                // LAME 3.100 no longer uses the limit and does not export a setter.
                params.cwlimit_hz = Some(normalize_frequency(float_value(entry)?, 50.0));
            }
            "--resample" => {
                let token = required_value(entry)?;
                let hz = resample_rate(token).ok_or_else(|| {
                    EncoderError::config(&option, format!("unknown sample rate '{token}'"))
                })?;
                builder
                    .set_output_sample_rate(NonZeroU32::new(hz))
                    .map_err(setter)?;
                params.resample_hz = Some(hz);
            }
            "-X" => {
                let value = integer_value(entry)?;
                let mode = c_int::try_from(value).map_err(|_| {
                    EncoderError::config(&option, format!("'{value}' is out of range"))
                })?;
                set_raw(builder, ffi::lame_set_quant_comp, mode).map_err(raw)?;
                params.quant_comp = Some(mode);
            }
            _ => return Err(EncoderError::config(&option, "unknown option")),
        }

        Ok(())
    }

    /// Fix the input format and initialise the encoder.
    ///
    /// Mono input always encodes as mono, whatever `-m` asked for. No
    /// VBR/Xing tag is written since the output stream is never rewritten.
    /// On failure the native context is released and the session is left in
    /// [`SessionState::Failed`].
    pub fn finalize_params(&mut self, sample_rate: u32, channels: u16) -> Result<()> {
        let mut builder = match std::mem::replace(&mut self.stage, Stage::Failed) {
            Stage::Configuring(builder) => builder,
            other => {
                self.stage = other;
                return Err(EncoderError::Misuse("parameters already finalized"));
            }
        };

        let params_err = |e: mp3lame_encoder::BuildError| EncoderError::Params(format!("{e:?}"));

        let channel_count = match channels {
            1 | 2 => channels as u8,
            other => {
                return Err(EncoderError::Params(format!(
                    "{other} input channels not supported"
                )))
            }
        };
        builder.set_num_channels(channel_count).map_err(params_err)?;
        builder.set_sample_rate(sample_rate).map_err(params_err)?;
        if channels == 1 {
            builder.set_mode(Mode::Mono).map_err(params_err)?;
            self.params.mode = Some(ChannelMode::Mono);
        }
        builder.set_to_write_vbr_tag(false).map_err(params_err)?;

        let encoder = builder.build().map_err(params_err)?;
        self.params.sample_rate = Some(sample_rate);
        self.params.channels = Some(channels);
        self.stage = Stage::Encoding(encoder);

        #[cfg(feature = "tracing")]
        tracing::debug!("Encoder parameters finalized: {}", self.params);

        Ok(())
    }

    /// Encode one block and return the MP3 bytes it produced, possibly none.
    ///
    /// The returned slice is valid until the next call on this session.
    pub fn encode_block(&mut self, block: &PcmBlock) -> Result<&[u8]> {
        let encoder = match &mut self.stage {
            Stage::Encoding(encoder) => encoder,
            Stage::Configuring(_) => {
                return Err(EncoderError::Misuse(
                    "encode called before parameters were finalized",
                ))
            }
            Stage::Flushed => return Err(EncoderError::Misuse("encode called after flush")),
            Stage::Failed => return Err(EncoderError::Misuse("encode called on a failed session")),
        };

        self.buffer.clear();
        self.buffer
            .reserve(mp3lame_encoder::max_required_buffer_size(block.frames()));

        let encoded = if self.params.channels == Some(1) {
            encoder.encode_to_vec(MonoPcm(block.left()), &mut self.buffer)
        } else {
            encoder.encode_to_vec(
                DualPcm {
                    left: block.left(),
                    right: block.right(),
                },
                &mut self.buffer,
            )
        };
        encoded.map_err(|e| EncoderError::Encode(format!("{e:?}")))?;

        Ok(&self.buffer)
    }

    /// Drain buffered frames and return the final MP3 bytes.
    ///
    /// Only one flush is allowed per session, even when it fails.
    pub fn flush(&mut self) -> Result<&[u8]> {
        let encoder = match &mut self.stage {
            Stage::Encoding(encoder) => encoder,
            Stage::Flushed => return Err(EncoderError::Misuse("flush called twice")),
            Stage::Configuring(_) => {
                return Err(EncoderError::Misuse(
                    "flush called before parameters were finalized",
                ))
            }
            Stage::Failed => return Err(EncoderError::Misuse("flush called on a failed session")),
        };

        self.buffer.clear();
        self.buffer
            .reserve(mp3lame_encoder::max_required_buffer_size(BLOCK_CAPACITY));
        let flushed = encoder.flush_to_vec::<FlushNoGap>(&mut self.buffer);
        self.stage = Stage::Flushed;
        flushed.map_err(|e| EncoderError::Flush(format!("{e:?}")))?;

        Ok(&self.buffer)
    }
}

impl fmt::Debug for EncoderSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderSession")
            .field("state", &self.state())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Interpret a bitrate argument: values of 8000 and above are bits per
/// second and are rounded to kbps, then the result is clamped to 8..=320.
pub fn normalize_bitrate(value: i64) -> u16 {
    let kbps = if value >= 8000 { (value + 500) / 1000 } else { value };
    kbps.clamp(8, 320) as u16
}

/// Nearest valid MPEG bitrate; ties resolve upward.
pub fn snap_bitrate(kbps: u16) -> u16 {
    VALID_BITRATES
        .iter()
        .copied()
        .min_by_key(|valid| (valid.abs_diff(kbps), u16::MAX - valid))
        .unwrap_or(128)
}

/// Interpret a frequency argument: values below `khz_below` are kHz, the
/// rest Hz. The result is clamped to 1..=50000 Hz.
pub fn normalize_frequency(value: f32, khz_below: f32) -> i32 {
    let hz = if value < khz_below { value * 1000.0 } else { value };
    hz.clamp(1.0, MAX_FREQUENCY_HZ) as i32
}

/// Sample rate in Hz for a `--resample` token.
pub fn resample_rate(token: &str) -> Option<u32> {
    RESAMPLE_RATES
        .iter()
        .find(|(name, _)| *name == token)
        .map(|(_, hz)| *hz)
}

fn khz_to_hz(khz: f32) -> i32 {
    (khz * 1000.0) as i32
}

/// Call an integer setter of the raw LAME API on the builder's context.
fn set_raw(
    builder: &mut Builder,
    setter: unsafe extern "C" fn(*mut ffi::lame_global_flags, c_int) -> c_int,
    value: c_int,
) -> std::result::Result<(), c_int> {
    // SAFETY: the context is owned by `builder`, valid and not shared.
    let code = unsafe { setter(builder.as_ptr(), value) };
    if code == 0 {
        Ok(())
    } else {
        Err(code)
    }
}

fn clamp_level(value: i64) -> u8 {
    value.clamp(0, 9) as u8
}

fn required_value(entry: &OptionEntry) -> Result<&str> {
    entry
        .value
        .as_deref()
        .ok_or_else(|| EncoderError::config(entry.to_string(), "missing value"))
}

fn integer_value(entry: &OptionEntry) -> Result<i64> {
    let value = required_value(entry)?;
    value.parse().map_err(|_| {
        EncoderError::config(entry.to_string(), format!("'{value}' is not an integer"))
    })
}

fn float_value(entry: &OptionEntry) -> Result<f32> {
    let value = required_value(entry)?;
    value
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| EncoderError::config(entry.to_string(), format!("'{value}' is not a number")))
}

fn quality(level: u8) -> Quality {
    match level {
        0 => Quality::Best,
        1 => Quality::SecondBest,
        2 => Quality::NearBest,
        3 => Quality::VeryNice,
        4 => Quality::Nice,
        5 => Quality::Good,
        6 => Quality::Decent,
        7 => Quality::Ok,
        8 => Quality::SecondWorst,
        _ => Quality::Worst,
    }
}

fn bitrate(kbps: u16) -> Bitrate {
    match kbps {
        0..=8 => Bitrate::Kbps8,
        9..=16 => Bitrate::Kbps16,
        17..=24 => Bitrate::Kbps24,
        25..=32 => Bitrate::Kbps32,
        33..=40 => Bitrate::Kbps40,
        41..=48 => Bitrate::Kbps48,
        49..=64 => Bitrate::Kbps64,
        65..=80 => Bitrate::Kbps80,
        81..=96 => Bitrate::Kbps96,
        97..=112 => Bitrate::Kbps112,
        113..=128 => Bitrate::Kbps128,
        129..=160 => Bitrate::Kbps160,
        161..=192 => Bitrate::Kbps192,
        193..=224 => Bitrate::Kbps224,
        225..=256 => Bitrate::Kbps256,
        _ => Bitrate::Kbps320,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(options: &str) -> Result<EncoderSession> {
        EncoderSession::with_config(&EncoderConfig::parse(options))
    }

    fn configured(options: &str) -> EncoderSession {
        session(options).unwrap()
    }

    fn config_option(err: EncoderError) -> String {
        match err {
            EncoderError::Config { option, .. } => option,
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_bitrate_normalisation() {
        assert_eq!(normalize_bitrate(128_000), 128);
        assert_eq!(normalize_bitrate(127_600), 128);
        assert_eq!(normalize_bitrate(8000), 8);
        assert_eq!(normalize_bitrate(7999), 320);
        assert_eq!(normalize_bitrate(500), 320);
        assert_eq!(normalize_bitrate(2), 8);
        assert_eq!(normalize_bitrate(-40), 8);
    }

    #[test]
    fn test_bitrate_snapping() {
        assert_eq!(snap_bitrate(128), 128);
        assert_eq!(snap_bitrate(130), 128);
        assert_eq!(snap_bitrate(144), 160);
        assert_eq!(snap_bitrate(300), 320);
        assert_eq!(snap_bitrate(8), 8);
    }

    #[test]
    fn test_vbr_quality_is_clamped_and_enables_vbr() {
        let params = configured("-V 12").params().clone();
        assert_eq!(params.vbr_quality, Some(9));
        assert_eq!(params.rate_control, RateControl::Vbr);

        let params = configured("-V -3").params().clone();
        assert_eq!(params.vbr_quality, Some(0));
    }

    #[test]
    fn test_vbr_quality_keeps_abr() {
        let params = configured("--abr 160000 -V 4").params().clone();
        assert_eq!(params.rate_control, RateControl::Abr);
        assert_eq!(params.bitrate_kbps, Some(160));
    }

    #[test]
    fn test_later_entries_override_earlier() {
        let params = configured("-v -b 192 --cbr -m f -q 11").params().clone();
        assert_eq!(params.rate_control, RateControl::Cbr);
        assert_eq!(params.bitrate_kbps, Some(192));
        assert_eq!(params.mode, Some(ChannelMode::JointStereo));
        assert_eq!(params.quality, Some(9));
    }

    #[test]
    fn test_presets() {
        let params = configured("--preset extreme").params().clone();
        assert_eq!(params.rate_control, RateControl::Vbr);
        assert_eq!(params.vbr_quality, Some(0));

        let params = configured("--preset insane").params().clone();
        assert_eq!(params.rate_control, RateControl::Cbr);
        assert_eq!(params.bitrate_kbps, Some(320));
    }

    #[test]
    fn test_stops_at_first_bad_entry() {
        let err = session("-m j -V x -q 2").unwrap_err();
        assert_eq!(config_option(err), "-V x");

        let err = session("-m q").unwrap_err();
        assert_eq!(config_option(err), "-m q");

        let err = session("--preset loud").unwrap_err();
        assert_eq!(config_option(err), "--preset loud");

        let err = session("-b").unwrap_err();
        assert_eq!(config_option(err), "-b");
    }

    #[test]
    fn test_rejects_unknown_options() {
        let err = session("--nonsense").unwrap_err();
        assert!(err.to_string().contains("unknown option"));

        let err = session("--resample 44").unwrap_err();
        assert!(err.to_string().contains("unknown sample rate '44'"));
        assert_eq!(config_option(err), "--resample 44");

        let err = session("--lowpass high").unwrap_err();
        assert_eq!(config_option(err), "--lowpass high");
    }

    #[test]
    fn test_filter_frequencies_are_normalised() {
        let params = configured("--lowpass 16 --highpass 0.5").params().clone();
        assert_eq!(params.lowpass_hz, Some(16_000));
        assert_eq!(params.highpass_hz, Some(500));

        // kHz only below 50 (lowpass, cwlimit) or 16 (highpass).
        let params = configured("--lowpass 60 --highpass 20 --cwlimit 8.8").params().clone();
        assert_eq!(params.lowpass_hz, Some(60));
        assert_eq!(params.highpass_hz, Some(20));
        assert_eq!(params.cwlimit_hz, Some(8_800));

        let params = configured("--lowpass 99999 --highpass -3").params().clone();
        assert_eq!(params.lowpass_hz, Some(50_000));
        assert_eq!(params.highpass_hz, Some(1));

        let params = configured("--lowpass-width 2.5 --highpass-width 0.1").params().clone();
        assert_eq!(params.lowpass_width_hz, Some(2_500));
        assert_eq!(params.highpass_width_hz, Some(100));

        let params = configured("--lowpass 16 -k").params().clone();
        assert_eq!(params.lowpass_hz, Some(FILTER_OFF));
        assert_eq!(params.highpass_hz, Some(FILTER_OFF));
    }

    #[test]
    fn test_resample_tokens() {
        assert_eq!(resample_rate("11"), Some(11_025));
        assert_eq!(resample_rate("22.05"), Some(22_050));
        assert_eq!(resample_rate("44.1"), Some(44_100));
        assert_eq!(resample_rate("44"), None);

        let params = configured("--resample 22").params().clone();
        assert_eq!(params.resample_hz, Some(22_050));
    }

    #[test]
    fn test_vbr_bounds_quant_comp_and_forced_ms() {
        let params = configured("-B 250000 -X 3 -m f").params().clone();
        assert_eq!(params.vbr_max_kbps, Some(256));
        assert_eq!(params.quant_comp, Some(3));
        assert!(params.force_ms);
        assert_eq!(params.mode, Some(ChannelMode::JointStereo));

        assert!(!configured("-m j").params().force_ms);
    }

    #[test]
    fn test_abr_mean_is_not_snapped() {
        let params = configured("--abr 150").params().clone();
        assert_eq!(params.rate_control, RateControl::Abr);
        assert_eq!(params.bitrate_kbps, Some(150));
    }

    fn noise_block(seed: &mut u32) -> PcmBlock {
        let mut lane = || -> Vec<i16> {
            (0..BLOCK_CAPACITY)
                .map(|_| {
                    *seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                    (*seed >> 16) as i16
                })
                .collect()
        };
        let (left, right) = (lane(), lane());
        let mut block = PcmBlock::new();
        block.fill(&left, &right).unwrap();
        block
    }

    fn encoded_size(options: &str, blocks: usize) -> usize {
        let mut session = configured(options);
        session.finalize_params(44100, 2).unwrap();
        let mut seed = 7;
        let mut total = 0;
        for _ in 0..blocks {
            total += session.encode_block(&noise_block(&mut seed)).unwrap().len();
        }
        total + session.flush().unwrap().len()
    }

    #[test]
    fn test_abr_mean_bitrate_controls_output_size() {
        let low = encoded_size("--abr 32", 200);
        let high = encoded_size("--abr 320", 200);
        assert!(high > low * 3, "abr 32: {low} bytes, abr 320: {high} bytes");
    }

    #[test]
    fn test_filters_and_resample_encode() {
        let plain = encoded_size("-b 128", 40);
        let filtered = encoded_size("-b 128 --lowpass 4 --highpass 0.2 -X 2", 40);
        let resampled = encoded_size("-b 32 --resample 16", 40);
        assert!(plain > 0 && filtered > 0);
        assert!(resampled < plain);
    }

    #[test]
    fn test_lifecycle_misuse() {
        let mut session = configured("-b 128");
        let block = PcmBlock::new();

        assert!(matches!(
            session.encode_block(&block),
            Err(EncoderError::Misuse(_))
        ));

        session.finalize_params(44100, 2).unwrap();
        assert_eq!(session.state(), SessionState::Encoding);
        assert!(matches!(
            session.apply(&EncoderConfig::parse("-q 2")),
            Err(EncoderError::Misuse(_))
        ));
        assert!(matches!(
            session.finalize_params(44100, 2),
            Err(EncoderError::Misuse(_))
        ));

        session.flush().unwrap();
        assert_eq!(session.state(), SessionState::Flushed);
        assert!(matches!(session.flush(), Err(EncoderError::Misuse(_))));
        assert!(matches!(
            session.encode_block(&block),
            Err(EncoderError::Misuse(_))
        ));
    }

    #[test]
    fn test_rejects_unsupported_channel_count() {
        let mut session = configured("");
        let err = session.finalize_params(44100, 6).unwrap_err();
        assert!(matches!(err, EncoderError::Params(_)));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn test_mono_input_forces_mono_mode() {
        let mut session = configured("-m j");
        session.finalize_params(22050, 1).unwrap();
        assert_eq!(session.params().mode, Some(ChannelMode::Mono));
        assert_eq!(session.params().to_string(), "cbr mono 22050Hz/1ch");
    }

    #[test]
    fn test_encodes_stereo_tone() {
        let mut session = configured("-m j -b 128");
        session.finalize_params(44100, 2).unwrap();

        let left: Vec<i16> = (0..BLOCK_CAPACITY)
            .map(|n| ((n as f32 * 0.05).sin() * 8000.0) as i16)
            .collect();
        let mut block = PcmBlock::new();
        block.fill(&left, &left).unwrap();

        let mut total = 0;
        for _ in 0..40 {
            total += session.encode_block(&block).unwrap().len();
        }
        total += session.flush().unwrap().len();
        assert!(total > 0);
    }

    #[test]
    fn test_flush_without_blocks() {
        let mut session = configured("-V 2");
        session.finalize_params(8000, 1).unwrap();
        assert!(session.flush().is_ok());
    }
}
