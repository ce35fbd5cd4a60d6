//! Error types for the Sakina turn pipeline.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type SakinaResult<T> = Result<T, SakinaError>;

/// Errors that can occur while processing a conversational turn.
///
/// Conversion, transcription, and analysis errors are fatal to the turn.
/// Generation and synthesis errors are self-healing (fallback text / empty
/// audio) and should normally never surface through the pipeline.
#[derive(Error, Debug)]
pub enum SakinaError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Audio conversion failed: {0}")]
    Conversion(String),

    #[error("Speech-to-text failed: {0}")]
    Transcription(String),

    #[error("Intent/emotion analysis failed: {0}")]
    Analysis(String),

    #[error("Response generation failed: {0}")]
    Generation(String),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Conversation log write failed: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SakinaError {
    /// Short stage tag used in user-facing error messages and logs.
    pub fn stage(&self) -> &'static str {
        match self {
            SakinaError::Input(_) => "input",
            SakinaError::Conversion(_) => "conversion",
            SakinaError::Transcription(_) => "transcription",
            SakinaError::Analysis(_) => "analysis",
            SakinaError::Generation(_) => "generation",
            SakinaError::Synthesis(_) => "synthesis",
            SakinaError::Persistence(_) => "persistence",
            SakinaError::Config(_) => "config",
            SakinaError::Io(_) => "io",
        }
    }
}
