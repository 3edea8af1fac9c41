//! TF-IDF lexical scorer.
//!
//! Term statistics are computed once by [`LexicalScorer::fit`] and never
//! refreshed implicitly; a corpus change requires fitting a new scorer. After
//! fitting the scorer is read-only and can be shared across concurrent queries.
//!
//! Weighting: `idf = ln((1 + n) / (1 + df)) + 1`, segment and query vectors
//! are `tf * idf` normalized to unit length, and the score is their dot
//! product (cosine similarity).

use std::collections::{BTreeMap, HashMap};

use tracing::info;

use crate::rag::core::errors::{RagError, RagResult};
use crate::rag::core::ids::SegmentId;
use crate::rag::corpus::store::SegmentStore;
use crate::rag::lexical::tokenizer::tokenize;

/// One scored segment from the lexical scorer.
#[derive(Clone, Debug, PartialEq)]
pub struct LexicalHit {
    /// Segment id.
    pub segment_id: SegmentId,
    /// Cosine similarity in [0, 1].
    pub score: f64,
}

/// Posting entry: segment index and normalized term weight.
#[derive(Clone, Copy, Debug)]
struct Posting {
    doc: usize,
    weight: f64,
}

/// Fitted term statistics.
#[derive(Debug)]
struct FittedIndex {
    /// Segment ids sorted ascending; index position is the internal doc id.
    segment_ids: Vec<SegmentId>,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    postings: Vec<Vec<Posting>>,
}

/// Lexical scorer over a fixed corpus.
#[derive(Debug, Default)]
pub struct LexicalScorer {
    index: Option<FittedIndex>,
}

impl LexicalScorer {
    /// Create an unfitted scorer.
    #[must_use]
    pub const fn new() -> Self {
        Self { index: None }
    }

    /// Build and fit a scorer over every segment of a store.
    ///
    /// # Errors
    /// Returns an error if the store is empty.
    pub fn fitted_from(store: &dyn SegmentStore) -> RagResult<Self> {
        let mut scorer = Self::new();
        scorer.fit(
            store
                .segments()
                .map(|s| (s.segment_id.clone(), s.text.clone())),
        )?;
        Ok(scorer)
    }

    /// Compute term statistics for the corpus, replacing any previous fit.
    ///
    /// # Errors
    /// Returns an error if the corpus is empty or contains duplicate ids.
    pub fn fit<I>(&mut self, corpus: I) -> RagResult<()>
    where
        I: IntoIterator<Item = (SegmentId, String)>,
    {
        let mut docs: BTreeMap<SegmentId, Vec<String>> = BTreeMap::new();
        for (segment_id, text) in corpus {
            let tokens = tokenize(&text)?;
            if docs.insert(segment_id.clone(), tokens).is_some() {
                return Err(RagError::InvalidSegment(format!(
                    "duplicate segment id {segment_id} in lexical corpus"
                )));
            }
        }
        if docs.is_empty() {
            return Err(RagError::InvalidSegment(
                "cannot fit lexical scorer on an empty corpus".to_string(),
            ));
        }

        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: Vec<usize> = Vec::new();
        let mut term_counts: Vec<HashMap<usize, usize>> = Vec::with_capacity(docs.len());
        for tokens in docs.values() {
            let mut counts: HashMap<usize, usize> = HashMap::new();
            for token in tokens {
                let next_id = vocabulary.len();
                let term = *vocabulary.entry(token.clone()).or_insert(next_id);
                if term == doc_freq.len() {
                    doc_freq.push(0);
                }
                *counts.entry(term).or_insert(0) += 1;
            }
            for term in counts.keys() {
                doc_freq[*term] += 1;
            }
            term_counts.push(counts);
        }

        let n = count_as_f64(docs.len());
        let idf: Vec<f64> = doc_freq
            .iter()
            .map(|df| ((1.0 + n) / (1.0 + count_as_f64(*df))).ln() + 1.0)
            .collect();

        let mut postings: Vec<Vec<Posting>> = vec![Vec::new(); vocabulary.len()];
        for (doc, counts) in term_counts.iter().enumerate() {
            let weights = normalized_weights(counts, &idf);
            for (term, weight) in weights {
                postings[term].push(Posting { doc, weight });
            }
        }

        let segment_ids: Vec<SegmentId> = docs.into_keys().collect();
        info!(
            "Fitted lexical scorer on {} segments, {} terms",
            segment_ids.len(),
            vocabulary.len()
        );

        self.index = Some(FittedIndex {
            segment_ids,
            vocabulary,
            idf,
            postings,
        });
        Ok(())
    }

    /// Whether `fit` has been called.
    #[must_use]
    pub const fn is_fitted(&self) -> bool {
        self.index.is_some()
    }

    /// Number of fitted segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.as_ref().map_or(0, |index| index.segment_ids.len())
    }

    /// Whether no segments are fitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the segment was part of the fitted corpus.
    #[must_use]
    pub fn contains(&self, segment_id: &SegmentId) -> bool {
        self.index
            .as_ref()
            .is_some_and(|index| index.segment_ids.binary_search(segment_id).is_ok())
    }

    /// Score every fitted segment against the query and return the best `top_k`.
    ///
    /// Ties are broken by ascending segment id.
    ///
    /// # Errors
    /// Returns `IndexNotReady` if the scorer was never fitted.
    pub fn score(&self, query_text: &str, top_k: usize) -> RagResult<Vec<LexicalHit>> {
        let index = self.index.as_ref().ok_or(RagError::IndexNotReady)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let mut counts: HashMap<usize, usize> = HashMap::new();
        for token in tokenize(query_text)? {
            if let Some(term) = index.vocabulary.get(&token) {
                *counts.entry(*term).or_insert(0) += 1;
            }
        }

        let mut scores = vec![0.0_f64; index.segment_ids.len()];
        for (term, query_weight) in normalized_weights(&counts, &index.idf) {
            for posting in &index.postings[term] {
                scores[posting.doc] += query_weight * posting.weight;
            }
        }

        // Doc ids follow segment id order, so a stable sort keeps id ties ascending.
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|a, b| scores[*b].total_cmp(&scores[*a]));
        order.truncate(top_k);

        Ok(order
            .into_iter()
            .map(|doc| LexicalHit {
                segment_id: index.segment_ids[doc].clone(),
                score: scores[doc],
            })
            .collect())
    }
}

/// `tf * idf` weights scaled to unit length.
fn normalized_weights(counts: &HashMap<usize, usize>, idf: &[f64]) -> Vec<(usize, f64)> {
    let raw: Vec<(usize, f64)> = counts
        .iter()
        .map(|(term, tf)| (*term, count_as_f64(*tf) * idf[*term]))
        .collect();
    let norm = raw.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
    if norm <= f64::EPSILON {
        return Vec::new();
    }
    raw.into_iter().map(|(term, w)| (term, w / norm)).collect()
}

#[allow(clippy::cast_precision_loss)] // Corpus and term counts are far below 2^52.
fn count_as_f64(count: usize) -> f64 {
    count as f64
}
