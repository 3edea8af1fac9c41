//! Candidate reranking with per-candidate failure isolation.
//!
//! Every candidate is judged independently. A failed judgement becomes an
//! explicit [`ScoreOutcome`] error that is folded into the neutral score when
//! results are aggregated, so one bad candidate never aborts the batch. The
//! final order is a stable sort on relevance, which keeps fused order among
//! equally relevant candidates.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::rag::core::candidate::{Candidate, NEUTRAL_RELEVANCE};
use crate::rag::core::errors::{RagError, RagResult};
use crate::rag::core::ids::SegmentId;
use crate::rag::corpus::store::SegmentStore;
use crate::rag::rerank::relevance::{RelevanceFuture, RelevanceLabel, RelevanceModel};

/// Result of judging a single candidate.
pub type ScoreOutcome = RagResult<RelevanceLabel>;

/// Reranker over a relevance model and the segment store.
pub struct Reranker {
    model: Arc<dyn RelevanceModel>,
    segments: Arc<dyn SegmentStore>,
    max_concurrency: usize,
}

impl Reranker {
    /// Create a reranker scoring at most `max_concurrency` candidates at once.
    #[must_use]
    pub fn new(
        model: Arc<dyn RelevanceModel>,
        segments: Arc<dyn SegmentStore>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            model,
            segments,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Judge every candidate, returning one outcome per candidate in input order.
    pub async fn score_candidates(&self, query_text: &str, candidates: &[Candidate]) -> Vec<ScoreOutcome> {
        let segment_ids: Vec<SegmentId> = candidates.iter().map(|c| c.segment_id.clone()).collect();
        stream::iter(segment_ids)
            .map(move |segment_id| self.judge_owned(query_text, segment_id))
            .buffered(self.max_concurrency)
            .collect()
            .await
    }

    /// Score and reorder candidates by relevance.
    ///
    /// Never fails: candidates whose scoring failed get the neutral score.
    pub async fn rerank(&self, query_text: &str, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let outcomes = self.score_candidates(query_text, &candidates).await;
        let reranked = apply_outcomes(candidates, outcomes);
        debug!(
            "Reranked {} candidates with {}",
            reranked.len(),
            self.model.model_id()
        );
        reranked
    }

    /// Judgement future owning its segment id, so the stream holds no borrowed items.
    fn judge_owned<'a>(
        &'a self,
        query_text: &'a str,
        segment_id: SegmentId,
    ) -> RelevanceFuture<'a, ScoreOutcome> {
        Box::pin(async move { self.judge_one(query_text, &segment_id).await })
    }

    async fn judge_one(&self, query_text: &str, segment_id: &SegmentId) -> ScoreOutcome {
        let text = self.segments.read(segment_id).map_err(|err| RagError::RerankFailure {
            segment_id: segment_id.clone(),
            reason: err.to_string(),
        })?;
        self.model
            .judge(query_text, &text)
            .await
            .map_err(|err| RagError::RerankFailure {
                segment_id: segment_id.clone(),
                reason: err.to_string(),
            })
    }
}

/// Fold outcomes into relevance scores and stable-sort by relevance descending.
#[must_use]
pub fn apply_outcomes(mut candidates: Vec<Candidate>, outcomes: Vec<ScoreOutcome>) -> Vec<Candidate> {
    let mut outcomes = outcomes.into_iter();
    for candidate in &mut candidates {
        let score = match outcomes.next() {
            Some(Ok(label)) => label.score(),
            Some(Err(err)) => {
                warn!("Using neutral relevance for {}: {err}", candidate.segment_id);
                NEUTRAL_RELEVANCE
            }
            None => {
                warn!("No relevance outcome for {}, using neutral score", candidate.segment_id);
                NEUTRAL_RELEVANCE
            }
        };
        candidate.relevance_score = Some(score);
    }

    candidates.sort_by(|a, b| {
        let a = a.relevance_score.unwrap_or(NEUTRAL_RELEVANCE);
        let b = b.relevance_score.unwrap_or(NEUTRAL_RELEVANCE);
        b.total_cmp(&a)
    });
    candidates
}
