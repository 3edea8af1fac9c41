//! Relevance reranking of fused candidates.

pub mod relevance;
pub mod reranker;

pub use relevance::{OllamaRelevanceModel, RelevanceFuture, RelevanceLabel, RelevanceModel};
pub use reranker::{Reranker, ScoreOutcome, apply_outcomes};
