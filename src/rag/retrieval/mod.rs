//! Hybrid retrieval and rank fusion.

pub mod fusion;
pub mod hybrid;

pub use fusion::{reciprocal_rank, reciprocal_rank_fusion};
pub use hybrid::HybridRetriever;
