//! Pipeline orchestration: retrieve, rerank, then optionally summarize.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::rag::core::candidate::{NEUTRAL_RELEVANCE, RetrievalSource};
use crate::rag::core::config::RagConfig;
use crate::rag::core::errors::{RagError, RagResult};
use crate::rag::core::ids::{QueryId, SegmentId};
use crate::rag::core::segment::Query;
use crate::rag::corpus::store::{InMemorySegmentStore, SegmentStore};
use crate::rag::lexical::scorer::LexicalScorer;
use crate::rag::rerank::relevance::{OllamaRelevanceModel, RelevanceModel};
use crate::rag::rerank::reranker::Reranker;
use crate::rag::retrieval::hybrid::HybridRetriever;
use crate::rag::summarization::summarizer::{LlmSummarizer, Summarizer};
use crate::rag::vector::client::VectorSearchClient;
use crate::rag::vector::milvus::MilvusVectorClient;

/// Shape of the pipeline output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Ranked segments only.
    #[default]
    Ranked,
    /// Ranked segments plus a summary of their text.
    Summarized,
}

/// One ranked result with its source text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedSegment {
    /// Segment identifier.
    pub segment_id: SegmentId,
    /// Reciprocal-rank fused score.
    pub fused_score: f64,
    /// Relevance score in [0, 1].
    pub relevance_score: f64,
    /// Backends that produced the segment.
    pub sources: BTreeSet<RetrievalSource>,
    /// Segment text.
    pub source_text: String,
}

/// Full pipeline response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineResponse {
    /// Identifier used in logs for this query.
    pub query_id: QueryId,
    /// Query as received.
    pub query_text: String,
    /// True when vector search did not contribute.
    pub degraded: bool,
    /// Results, at most `top_k`.
    pub results: Vec<RankedSegment>,
    /// Summary text in summarized mode.
    pub summary: Option<String>,
    /// Summarization failure, when the summary is missing.
    pub summary_error: Option<String>,
}

/// Backend dependencies for the pipeline.
pub struct PipelineBackends {
    /// Corpus segments.
    pub segments: Arc<dyn SegmentStore>,
    /// Lexical scorer fitted over `segments`.
    pub scorer: Arc<LexicalScorer>,
    /// Optional vector search client.
    pub vector: Option<Arc<dyn VectorSearchClient>>,
    /// Relevance judge.
    pub relevance: Arc<dyn RelevanceModel>,
    /// Optional summarizer.
    pub summarizer: Option<Arc<dyn Summarizer>>,
}

impl PipelineBackends {
    /// Build default backends from config.
    ///
    /// Loads the corpus, fits the scorer, and connects the Ollama and Milvus clients.
    ///
    /// # Errors
    /// Returns an error if the corpus cannot be loaded or a client cannot be built.
    pub fn from_config(config: &RagConfig) -> RagResult<Self> {
        let store = match (&config.corpus.manifest_path, &config.corpus.chunk_dir) {
            (Some(path), _) => InMemorySegmentStore::from_manifest(path)?,
            (None, Some(dir)) => InMemorySegmentStore::from_chunk_dir(dir)?,
            (None, None) => {
                return Err(RagError::InvalidConfig(
                    "corpus.manifest_path or corpus.chunk_dir is required".to_string(),
                ));
            }
        };
        let scorer = Arc::new(LexicalScorer::fitted_from(&store)?);
        info!("Fitted lexical scorer over {} segments", scorer.len());

        let vector: Option<Arc<dyn VectorSearchClient>> = if config.vector_store.endpoint.is_some() {
            Some(Arc::new(MilvusVectorClient::new(&config.vector_store)?))
        } else {
            warn!("No vector store endpoint configured, queries will be lexical-only");
            None
        };

        let summarizer: Option<Arc<dyn Summarizer>> = if config.summarization.enabled {
            Some(Arc::new(LlmSummarizer::new(&config.summarization)?))
        } else {
            None
        };

        Ok(Self {
            segments: Arc::new(store),
            scorer,
            vector,
            relevance: Arc::new(OllamaRelevanceModel::new(&config.relevance)?),
            summarizer,
        })
    }
}

/// Retrieve, rerank and summarize pipeline.
pub struct RagPipeline {
    config: RagConfig,
    segments: Arc<dyn SegmentStore>,
    retriever: HybridRetriever,
    reranker: Reranker,
    summarizer: Option<Arc<dyn Summarizer>>,
}

impl RagPipeline {
    /// Create a pipeline over explicit backends.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the scorer is not fitted.
    pub fn new(config: RagConfig, backends: PipelineBackends) -> RagResult<Self> {
        config.validate()?;
        check_corpus_alignment(backends.scorer.as_ref(), backends.segments.as_ref())?;
        let retriever = HybridRetriever::new(
            backends.scorer,
            backends.vector,
            &config.retrieval,
            Duration::from_millis(config.vector_store.timeout_ms),
        )?;
        let reranker = Reranker::new(
            backends.relevance,
            Arc::clone(&backends.segments),
            config.relevance.max_concurrency,
        );

        Ok(Self {
            config,
            segments: backends.segments,
            retriever,
            reranker,
            summarizer: backends.summarizer,
        })
    }

    /// Create a pipeline with backends built from config.
    ///
    /// # Errors
    /// Returns an error if backends cannot be initialized.
    pub fn from_config(config: RagConfig) -> RagResult<Self> {
        let backends = PipelineBackends::from_config(&config)?;
        Self::new(config, backends)
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Answer a query.
    ///
    /// `top_k` is clamped to `retrieval.max_top_k`. Vector failures set
    /// `degraded`; a summarization failure fills `summary_error` and keeps the results.
    ///
    /// # Errors
    /// Returns `InvalidQuery` for a blank query or `top_k == 0`.
    pub async fn run(
        &self,
        query_text: &str,
        query_embedding: Option<Vec<f32>>,
        top_k: usize,
        mode: OutputMode,
    ) -> RagResult<PipelineResponse> {
        let query_id = QueryId::new();
        let span = info_span!("query", query_id = %query_id);
        self.run_query(query_id, query_text, query_embedding, top_k, mode)
            .instrument(span)
            .await
    }

    async fn run_query(
        &self,
        query_id: QueryId,
        query_text: &str,
        query_embedding: Option<Vec<f32>>,
        top_k: usize,
        mode: OutputMode,
    ) -> RagResult<PipelineResponse> {
        if query_text.trim().is_empty() {
            return Err(RagError::InvalidQuery("query must not be empty".to_string()));
        }
        if top_k == 0 {
            return Err(RagError::InvalidQuery("top_k must be > 0".to_string()));
        }
        let top_k = if top_k > self.config.retrieval.max_top_k {
            debug!(
                "Clamping top_k {top_k} to {}",
                self.config.retrieval.max_top_k
            );
            self.config.retrieval.max_top_k
        } else {
            top_k
        };

        let query = match query_embedding {
            Some(embedding) => Query::new(query_text).with_embedding(embedding),
            None => Query::new(query_text),
        };

        let mut retrieved = self
            .retriever
            .retrieve(&query, top_k, self.config.retrieval.fanout)
            .await?;
        retrieved.truncate(top_k);
        let degraded = retrieved.degraded;

        let mut reranked = self.reranker.rerank(query_text, retrieved.candidates).await;
        reranked.truncate(top_k);

        let results: Vec<RankedSegment> = reranked
            .into_iter()
            .filter_map(|candidate| match self.segments.read(&candidate.segment_id) {
                Ok(source_text) => Some(RankedSegment {
                    segment_id: candidate.segment_id,
                    fused_score: candidate.fused_score,
                    relevance_score: candidate.relevance_score.unwrap_or(NEUTRAL_RELEVANCE),
                    sources: candidate.sources,
                    source_text,
                }),
                Err(err) => {
                    warn!("Dropping {} from results: {err}", candidate.segment_id);
                    None
                }
            })
            .collect();

        let (summary, summary_error) = match mode {
            OutputMode::Ranked => (None, None),
            OutputMode::Summarized => self.summarize(query_text, &results).await,
        };

        info!(
            "Answered query with {} results (degraded: {degraded})",
            results.len()
        );

        Ok(PipelineResponse {
            query_id,
            query_text: query_text.to_string(),
            degraded,
            results,
            summary,
            summary_error,
        })
    }

    async fn summarize(
        &self,
        query_text: &str,
        results: &[RankedSegment],
    ) -> (Option<String>, Option<String>) {
        let Some(summarizer) = &self.summarizer else {
            warn!("Summary requested but summarization is disabled");
            return (None, Some("summarization is disabled".to_string()));
        };
        let texts: Vec<String> = results.iter().map(|r| r.source_text.clone()).collect();
        match summarizer.summarize(query_text, &texts).await {
            Ok(summary) => (Some(summary), None),
            Err(err) => {
                error!("Summarization failed: {err}");
                (None, Some(err.to_string()))
            }
        }
    }
}

/// Every fitted segment must be readable from the store, and vice versa.
fn check_corpus_alignment(scorer: &LexicalScorer, segments: &dyn SegmentStore) -> RagResult<()> {
    if scorer.len() != segments.len() {
        return Err(RagError::InvalidConfig(format!(
            "lexical scorer covers {} segments but the store holds {}",
            scorer.len(),
            segments.len()
        )));
    }
    if let Some(segment) = segments.segments().find(|s| !scorer.contains(&s.segment_id)) {
        return Err(RagError::InvalidConfig(format!(
            "segment {} is not part of the fitted lexical index",
            segment.segment_id
        )));
    }
    Ok(())
}
