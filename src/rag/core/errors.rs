//! Error types for the retrieval pipeline.

use thiserror::Error;

use crate::rag::core::ids::SegmentId;

/// Pipeline error type.
#[derive(Debug, Error)]
pub enum RagError {
    /// Lexical scorer used before `fit` was called.
    #[error("lexical index is not ready; fit the scorer before querying")]
    IndexNotReady,
    /// Vector backend unreachable, timed out, or rejected the request.
    #[error("vector retrieval unavailable: {0}")]
    RetrievalUnavailable(String),
    /// Relevance scoring failed for a single candidate.
    #[error("rerank failed for segment {segment_id}: {reason}")]
    RerankFailure {
        /// Segment whose scoring failed.
        segment_id: SegmentId,
        /// Human-readable failure cause.
        reason: String,
    },
    /// External summarization call failed.
    #[error("summarization failed: {0}")]
    SummarizationError(String),
    /// Structured note extraction failed or returned an invalid document.
    #[error("notes extraction failed: {0}")]
    NotesExtraction(String),
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Invalid query input.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    /// Segment id not present in the corpus.
    #[error("segment not found: {0}")]
    SegmentNotFound(SegmentId),
    /// Segment rejected while loading the corpus.
    #[error("invalid segment: {0}")]
    InvalidSegment(String),
    /// Query embedding does not match the configured dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured dimension.
        expected: usize,
        /// Dimension of the supplied vector.
        actual: usize,
    },
    /// Raw HTTP client error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// HTTP client error from Rig.
    #[error("http client error: {0}")]
    HttpClient(#[from] rig::http_client::Error),
    /// Completion error.
    #[error("completion error: {0}")]
    Completion(#[from] rig::completion::CompletionError),
    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] rig::embeddings::EmbeddingError),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// Regex compilation error.
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagError {
    /// Whether the pipeline recovers from this error locally instead of failing the query.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RetrievalUnavailable(_)
                | Self::RerankFailure { .. }
                | Self::SummarizationError(_)
        )
    }
}

/// Convenience result alias for pipeline operations.
pub type RagResult<T> = Result<T, RagError>;
