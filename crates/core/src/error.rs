use crate::models::ScoredChunk;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("unsupported file extension for {filename:?}; allowed: .txt, .md")]
    UnsupportedExtension { filename: String },

    #[error("upload has no file name")]
    MissingFileName,

    #[error("question is missing or empty")]
    EmptyQuestion,

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("document {0} does not exist")]
    UnknownDocument(String),

    #[error("embedding dimension {actual} != {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("store request failed: {0}")]
    Request(String),
}

/// Why a completion call produced no text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionFailure {
    #[error("language model timed out")]
    Timeout,

    #[error("language model unreachable: {0}")]
    Unreachable(String),

    #[error("language model returned {0}")]
    Status(String),

    #[error("language model sent an unreadable response: {0}")]
    InvalidResponse(String),

    #[error("language model returned no text")]
    EmptyResponse,
}

/// Language-model failure. The retrieved sources travel with the error so a
/// caller can still show the passages that were found.
#[derive(Debug, Error)]
#[error("answer generation failed: {message}")]
pub struct GenerationError {
    pub message: String,
    pub sources: Vec<ScoredChunk>,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// True for errors caused by the caller's input rather than a backend.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::Validation(_))
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
