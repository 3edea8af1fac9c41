//! Reciprocal Rank Fusion over the lexical and vector result lists.
//!
//! RRF score = sum(1 / (k + rank)) over every list a segment appears in,
//! with 1-based ranks. Only positions matter, so the incompatible scales of
//! TF-IDF scores and vector distances never mix.

use std::collections::{HashMap, HashSet};
use std::collections::hash_map::Entry;

use crate::rag::core::candidate::{Candidate, RetrievalSource};
use crate::rag::core::ids::SegmentId;
use crate::rag::lexical::scorer::LexicalHit;
use crate::rag::vector::client::VectorHit;

/// Contribution of a 1-based rank.
#[must_use]
#[allow(clippy::cast_precision_loss)] // Rank values are small, precision loss is acceptable
pub fn reciprocal_rank(rank: usize, rrf_k: f64) -> f64 {
    1.0 / (rrf_k + rank as f64)
}

/// Fuse both ranked lists into at most `top_k` deduplicated candidates.
///
/// Output is sorted by fused score descending, ties by ascending segment id.
/// A segment repeated inside one list only counts at its first position.
#[must_use]
pub fn reciprocal_rank_fusion(
    lexical: &[LexicalHit],
    vector: &[VectorHit],
    rrf_k: f64,
    top_k: usize,
) -> Vec<Candidate> {
    let mut fused: HashMap<SegmentId, Candidate> =
        HashMap::with_capacity(lexical.len() + vector.len());

    let lexical_ranked = lexical.iter().map(|hit| (&hit.segment_id, hit.score));
    accumulate(&mut fused, lexical_ranked, RetrievalSource::Lexical, rrf_k);

    let vector_ranked = vector.iter().map(|hit| (&hit.segment_id, hit.distance));
    accumulate(&mut fused, vector_ranked, RetrievalSource::Vector, rrf_k);

    let mut candidates: Vec<Candidate> = fused.into_values().collect();
    candidates.sort_by(|a, b| {
        b.fused_score
            .total_cmp(&a.fused_score)
            .then_with(|| a.segment_id.cmp(&b.segment_id))
    });
    candidates.truncate(top_k);
    candidates
}

fn accumulate<'a, I>(
    fused: &mut HashMap<SegmentId, Candidate>,
    ranked: I,
    source: RetrievalSource,
    rrf_k: f64,
) where
    I: Iterator<Item = (&'a SegmentId, f64)>,
{
    let mut seen: HashSet<&SegmentId> = HashSet::new();
    let deduped = ranked.filter(|(segment_id, _)| seen.insert(*segment_id));

    for (index, (segment_id, raw_score)) in deduped.enumerate() {
        let candidate = match fused.entry(segment_id.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(Candidate::new(segment_id.clone(), source)),
        };
        candidate.sources.insert(source);
        match source {
            RetrievalSource::Lexical => candidate.lexical_score = Some(raw_score),
            RetrievalSource::Vector => candidate.vector_score = Some(raw_score),
        }
        candidate.fused_score += reciprocal_rank(index + 1, rrf_k);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(ids: &[&str]) -> Vec<LexicalHit> {
        ids.iter()
            .map(|id| LexicalHit {
                segment_id: SegmentId::from(*id),
                score: 1.0,
            })
            .collect()
    }

    fn vec_hits(ids: &[&str]) -> Vec<VectorHit> {
        ids.iter()
            .map(|id| VectorHit {
                segment_id: SegmentId::from(*id),
                distance: 0.1,
            })
            .collect()
    }

    fn ids(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.segment_id.as_str()).collect()
    }

    #[test]
    fn test_reciprocal_rank() {
        assert!((reciprocal_rank(1, 0.0) - 1.0).abs() < f64::EPSILON);
        assert!((reciprocal_rank(2, 0.0) - 0.5).abs() < f64::EPSILON);
        assert!((reciprocal_rank(1, 60.0) - 1.0 / 61.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_agreeing_lists() {
        let fused = reciprocal_rank_fusion(&lex(&["A", "B", "C"]), &vec_hits(&["A", "B", "C"]), 0.0, 3);
        assert_eq!(ids(&fused), vec!["A", "B", "C"]);
        assert!((fused[0].fused_score - 2.0).abs() < f64::EPSILON);
        assert!(fused.iter().all(Candidate::is_hybrid));
    }

    #[test]
    fn test_disjoint_lists_keep_both_sources() {
        let fused = reciprocal_rank_fusion(&lex(&["a", "b"]), &vec_hits(&["c", "d"]), 0.0, 10);
        assert_eq!(fused.len(), 4);
        assert_eq!(ids(&fused), vec!["a", "c", "b", "d"]);
        assert_eq!(fused[0].sources.len(), 1);
        assert!(fused[0].lexical_score.is_some());
        assert!(fused[1].vector_score.is_some());
    }

    #[test]
    fn test_overlap_is_monotonic() {
        let lexical = lex(&["x", "shared", "y"]);
        let vector = vec_hits(&["z", "w", "shared"]);
        let fused = reciprocal_rank_fusion(&lexical, &vector, 0.0, 10);
        let shared = fused.iter().find(|c| c.segment_id.as_str() == "shared");
        let score = shared.map_or(0.0, |c| c.fused_score);
        assert!(score >= reciprocal_rank(2, 0.0));
        assert!(score >= reciprocal_rank(3, 0.0));
        assert_eq!(shared.map(|c| c.sources.len()), Some(2));
    }

    #[test]
    fn test_truncates_to_top_k_with_id_ties() {
        let fused = reciprocal_rank_fusion(&lex(&["b", "d"]), &vec_hits(&["a", "c"]), 0.0, 2);
        assert_eq!(ids(&fused), vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_within_list_counts_once() {
        let fused = reciprocal_rank_fusion(&lex(&["a", "a", "b"]), &[], 0.0, 10);
        assert_eq!(fused.len(), 2);
        assert!((fused[0].fused_score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(reciprocal_rank_fusion(&[], &[], 0.0, 5).is_empty());
    }
}
