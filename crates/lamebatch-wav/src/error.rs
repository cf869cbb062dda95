//! Error types for lamebatch-wav.

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, WavError>;

/// Errors that can occur while reading a WAV file.
#[derive(Debug, thiserror::Error)]
pub enum WavError {
    /// The header is not a canonical uncompressed PCM header.
    #[error("invalid WAV file: {0}")]
    Invalid(String),

    /// The data chunk declared more samples than the file holds.
    #[error("corrupted WAV file: premature EOF")]
    PrematureEof,

    /// A block read asked for more frames than a [`PcmBlock`](crate::PcmBlock) holds.
    #[error("block of {requested} frames exceeds capacity of {capacity}")]
    BlockOverflow { requested: usize, capacity: usize },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WavError {
    /// Create an invalid header error.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }

    /// Whether this error was raised by header validation.
    pub fn is_invalid_header(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }
}
