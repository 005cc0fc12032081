//! Error types for the triage pipeline.

/// Top-level error type for the speech-triage core.
#[derive(Debug, thiserror::Error)]
pub enum CompanionError {
    /// Audio decoding, downmix, or resampling error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Stream segmenter error.
    #[error("segmenter error: {0}")]
    Segmenter(String),

    /// Rules engine / Guard error.
    #[error("guard error: {0}")]
    Guard(String),

    /// LLM intent backend error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Action adapter (smart-home, SIP, social) error.
    #[error("adapter error: {0}")]
    Adapter(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Orchestrator coordination error.
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, CompanionError>;
