//! Error types for YtCore.

use thiserror::Error;

/// Library-level error type for YtCore operations.
#[derive(Error, Debug)]
pub enum YtCoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Media source error: {0}")]
    VideoSource(String),

    #[error("Audio download failed: {0}")]
    AudioDownload(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Media not found: {0}")]
    VideoNotFound(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    UserInput(String),

    #[error("{0}")]
    SourceUnavailable(String),

    #[error("provider_unavailable: {0}")]
    ProviderTransient(String),

    #[error("provider returned an unusable contract: {0}")]
    ProviderContract(String),

    #[error("LIVE_STUCK_TIMEOUT")]
    LiveStuckTimeout,

    #[error("LIVE_BECAME_PRIVATE")]
    LiveBecamePrivate,

    #[error("LIVE_STOP_REQUESTED")]
    LiveStopRequested,

    #[error("NO_CAPTIONS")]
    NoCaptions,

    #[error("NO_TRANSCRIPT")]
    NoTranscript,
}

impl YtCoreError {
    /// Whether this error is fatal and should abort startup rather than
    /// degrade into a job/request failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, YtCoreError::Database(_) | YtCoreError::Config(_))
    }
}

/// Result type alias for YtCore operations.
pub type Result<T> = std::result::Result<T, YtCoreError>;
