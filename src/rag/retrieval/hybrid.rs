//! Hybrid retrieval combining the lexical scorer with vector search.
//!
//! Both backends are asked for `top_k * fanout` results, fused with
//! Reciprocal Rank Fusion, and cut back to `top_k`. A vector backend failure
//! never fails the query: retrieval continues lexical-only and the result set
//! is flagged as degraded.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::rag::core::candidate::ResultSet;
use crate::rag::core::config::RetrievalConfig;
use crate::rag::core::errors::{RagError, RagResult};
use crate::rag::core::segment::Query;
use crate::rag::lexical::scorer::LexicalScorer;
use crate::rag::retrieval::fusion::reciprocal_rank_fusion;
use crate::rag::vector::client::{VectorHit, VectorSearchClient};

/// Hybrid retriever over a fitted lexical scorer and an optional vector client.
pub struct HybridRetriever {
    scorer: Arc<LexicalScorer>,
    vector: Option<Arc<dyn VectorSearchClient>>,
    rrf_k: f64,
    vector_timeout: Duration,
}

impl HybridRetriever {
    /// Create a retriever.
    ///
    /// # Errors
    /// Returns `IndexNotReady` if the scorer was not fitted.
    pub fn new(
        scorer: Arc<LexicalScorer>,
        vector: Option<Arc<dyn VectorSearchClient>>,
        config: &RetrievalConfig,
        vector_timeout: Duration,
    ) -> RagResult<Self> {
        if !scorer.is_fitted() {
            return Err(RagError::IndexNotReady);
        }
        Ok(Self {
            scorer,
            vector,
            rrf_k: config.rrf_k,
            vector_timeout,
        })
    }

    /// Retrieve at most `top_k` fused candidates for a query.
    ///
    /// # Errors
    /// Returns an error only if the lexical scorer fails; vector failures degrade instead.
    pub async fn retrieve(&self, query: &Query, top_k: usize, fanout: usize) -> RagResult<ResultSet> {
        if top_k == 0 {
            return Ok(ResultSet::default());
        }
        let pool = top_k.saturating_mul(fanout.max(1));

        let lexical = self.scorer.score(&query.text, pool)?;
        let (vector, degraded) = match self.vector_hits(query, pool).await {
            Ok(hits) => (hits, false),
            Err(err) => {
                warn!("Vector search unavailable, continuing lexical-only: {err}");
                (Vec::new(), true)
            }
        };

        let candidates = reciprocal_rank_fusion(&lexical, &vector, self.rrf_k, top_k);
        debug!(
            "Fused {} lexical and {} vector hits into {} candidates",
            lexical.len(),
            vector.len(),
            candidates.len()
        );

        Ok(ResultSet {
            candidates,
            degraded,
        })
    }

    /// Run vector search under the timeout, keeping only segments the corpus knows,
    /// ranked best-first by the client's distance order.
    async fn vector_hits(&self, query: &Query, pool: usize) -> RagResult<Vec<VectorHit>> {
        let client = self.vector.as_ref().ok_or_else(|| {
            RagError::RetrievalUnavailable("no vector store configured".to_string())
        })?;
        let embedding = query.embedding.as_deref().ok_or_else(|| {
            RagError::RetrievalUnavailable("query has no embedding".to_string())
        })?;

        let hits = tokio::time::timeout(self.vector_timeout, client.search(embedding, pool))
            .await
            .map_err(|_| {
                RagError::RetrievalUnavailable(format!(
                    "vector search timed out after {} ms",
                    self.vector_timeout.as_millis()
                ))
            })??;

        let total = hits.len();
        let mut known: Vec<VectorHit> = hits
            .into_iter()
            .filter(|hit| self.scorer.contains(&hit.segment_id))
            .collect();
        client.distance_order().rank(&mut known);
        known.truncate(pool);
        if known.len() < total {
            debug!(
                "Dropped {} vector hits not present in the corpus",
                total - known.len()
            );
        }
        Ok(known)
    }
}
