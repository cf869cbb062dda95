//! Error types for lamebatch-encoder.

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, EncoderError>;

/// Errors raised by an [`EncoderSession`](crate::EncoderSession).
#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    /// The native encoder context could not be allocated.
    #[error("failed to allocate LAME encoder context")]
    Allocation,

    /// An option entry could not be applied.
    #[error("invalid encoder option '{option}': {reason}")]
    Config { option: String, reason: String },

    /// The encoder rejected the finalized parameter set.
    #[error("failed to initialise encoder parameters: {0}")]
    Params(String),

    /// Encoding a block failed.
    #[error("MP3 encoding failed: {0}")]
    Encode(String),

    /// Draining the encoder failed.
    #[error("MP3 flush failed: {0}")]
    Flush(String),

    /// A call was made in the wrong lifecycle stage.
    #[error("encoder misuse: {0}")]
    Misuse(&'static str),
}

impl EncoderError {
    /// Create a configuration error for one option entry.
    pub fn config(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            option: option.into(),
            reason: reason.into(),
        }
    }

    /// Whether the failure affects every session rather than this one.
    pub fn is_systemic(&self) -> bool {
        matches!(self, Self::Allocation)
    }
}
