//! Hybrid retrieval + reranking engine.
//!
//! A query flows through three stages:
//! - retrieval: lexical TF-IDF scores and vector neighbours fused with
//!   Reciprocal Rank Fusion ([`retrieval`]),
//! - reranking: every candidate judged independently by a relevance model,
//!   failures folded into a neutral score ([`rerank`]),
//! - optional summarization of the top results ([`summarization`]).
//!
//! [`engine::RagPipeline`] sequences the stages and keeps results within `top_k`.

pub mod core;
pub mod corpus;
pub mod embedding;
pub mod engine;
pub mod lexical;
pub mod notes;
pub mod rerank;
pub mod retrieval;
pub mod summarization;
pub mod vector;

pub use core::{
    Candidate, QueryId, RagConfig, RagError, RagResult, ResultSet, RetrievalSource, Segment,
    SegmentId,
};
pub use engine::{OutputMode, PipelineBackends, PipelineResponse, RagPipeline, RankedSegment};
