//! Core pipeline types: configuration, errors, identifiers, and data model.

pub mod candidate;
pub mod config;
pub mod errors;
pub mod ids;
pub mod segment;

pub use candidate::{Candidate, NEUTRAL_RELEVANCE, ResultSet, RetrievalSource};
pub use config::{
    CorpusConfig, EmbeddingConfig, NotesConfig, RagConfig, RelevanceConfig, RetrievalConfig,
    ServerConfig, SummarizationConfig, VectorStoreConfig,
};
pub use errors::{RagError, RagResult};
pub use ids::{QueryId, SegmentId};
pub use segment::{Query, Segment, SegmentPosition};
