//! Per-query candidate records and result sets.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::rag::core::ids::SegmentId;

/// Neutral relevance score used when the model cannot decide or fails.
pub const NEUTRAL_RELEVANCE: f64 = 0.5;

/// Retrieval signal that produced a candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalSource {
    /// Keyword (TF-IDF) scorer.
    Lexical,
    /// Nearest-neighbour vector search.
    Vector,
}

/// Ephemeral candidate produced by one retrieval call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Segment this candidate points at.
    pub segment_id: SegmentId,
    /// Raw lexical score, if the lexical list contained the segment.
    pub lexical_score: Option<f64>,
    /// Raw vector distance, if the vector list contained the segment.
    pub vector_score: Option<f64>,
    /// Reciprocal-rank fused score.
    pub fused_score: f64,
    /// Signals that returned this segment. Never empty.
    pub sources: BTreeSet<RetrievalSource>,
    /// Relevance in [0, 1], set by the reranker.
    pub relevance_score: Option<f64>,
}

impl Candidate {
    /// Start a candidate for a segment seen by one source.
    #[must_use]
    pub fn new(segment_id: SegmentId, source: RetrievalSource) -> Self {
        Self {
            segment_id,
            lexical_score: None,
            vector_score: None,
            fused_score: 0.0,
            sources: BTreeSet::from([source]),
            relevance_score: None,
        }
    }

    /// Whether both retrieval signals returned this segment.
    #[must_use]
    pub fn is_hybrid(&self) -> bool {
        self.sources.contains(&RetrievalSource::Lexical)
            && self.sources.contains(&RetrievalSource::Vector)
    }
}

/// Ordered candidates plus the degraded-mode flag.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Candidates in ranking order.
    pub candidates: Vec<Candidate>,
    /// True when one retrieval signal was unavailable for this query.
    pub degraded: bool,
}

impl ResultSet {
    /// Number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether the set holds no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Segment ids in ranking order.
    #[must_use]
    pub fn segment_ids(&self) -> Vec<SegmentId> {
        self.candidates
            .iter()
            .map(|c| c.segment_id.clone())
            .collect()
    }

    /// Drop everything past `top_k`.
    pub fn truncate(&mut self, top_k: usize) {
        self.candidates.truncate(top_k);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_candidate_has_single_source() {
        let candidate = Candidate::new(SegmentId::from("a"), RetrievalSource::Vector);
        assert_eq!(candidate.sources.len(), 1);
        assert!(!candidate.is_hybrid());
        assert!(candidate.relevance_score.is_none());
    }

    #[test]
    fn test_sources_serialize_snake_case() {
        let mut candidate = Candidate::new(SegmentId::from("a"), RetrievalSource::Lexical);
        candidate.sources.insert(RetrievalSource::Vector);
        let json = serde_json::to_value(&candidate).unwrap_or_default();
        assert_eq!(json["sources"], serde_json::json!(["lexical", "vector"]));
        assert!(candidate.is_hybrid());
    }

    #[test]
    fn test_result_set_truncate() {
        let mut set = ResultSet {
            candidates: vec![
                Candidate::new(SegmentId::from("a"), RetrievalSource::Lexical),
                Candidate::new(SegmentId::from("b"), RetrievalSource::Lexical),
            ],
            degraded: false,
        };
        set.truncate(1);
        assert_eq!(set.segment_ids(), vec![SegmentId::from("a")]);
    }
}
