//! Vector search client abstraction.

use std::cmp::Ordering;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::rag::core::errors::RagResult;
use crate::rag::core::ids::SegmentId;

/// Boxed future type for vector search operations.
pub type VectorFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Which end of the distance scale is better for a collection's metric.
///
/// This is a fixed property of the collection (L2 vs inner product), never
/// inferred from a response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceOrder {
    /// Smaller distances are closer (L2, cosine distance).
    #[default]
    LowerIsBetter,
    /// Larger values are closer (inner product, cosine similarity).
    HigherIsBetter,
}

impl DistanceOrder {
    /// Compare two distances so that the better one sorts first.
    #[must_use]
    pub fn compare(self, a: f64, b: f64) -> Ordering {
        match self {
            Self::LowerIsBetter => a.total_cmp(&b),
            Self::HigherIsBetter => b.total_cmp(&a),
        }
    }

    /// Sort hits best-first, ties broken by ascending segment id.
    pub fn rank(self, hits: &mut [VectorHit]) {
        hits.sort_by(|a, b| {
            self.compare(a.distance, b.distance)
                .then_with(|| a.segment_id.cmp(&b.segment_id))
        });
    }
}

/// One nearest-neighbour result.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorHit {
    /// Segment id.
    pub segment_id: SegmentId,
    /// Raw distance reported by the store.
    pub distance: f64,
}

/// Nearest-neighbour search over segment embeddings.
pub trait VectorSearchClient: Send + Sync {
    /// Return up to `top_k` neighbours of `embedding`, best first.
    ///
    /// # Errors
    /// Returns `RetrievalUnavailable` when the store cannot be reached or times out.
    fn search<'a>(
        &'a self,
        embedding: &'a [f32],
        top_k: usize,
    ) -> VectorFuture<'a, RagResult<Vec<VectorHit>>>;

    /// Distance direction of the backing collection.
    fn distance_order(&self) -> DistanceOrder;
}
