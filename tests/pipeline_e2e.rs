use std::collections::HashMap;
use std::sync::Arc;

use halldyll_rag::rag::core::config::RagConfig;
use halldyll_rag::rag::core::segment::{Segment, SegmentPosition};
use halldyll_rag::rag::corpus::InMemorySegmentStore;
use halldyll_rag::rag::embedding::{EmbedFuture, Embedder};
use halldyll_rag::rag::lexical::LexicalScorer;
use halldyll_rag::rag::notes::{ExtractionSchema, LlmNotesExtractor};
use halldyll_rag::rag::rerank::{RelevanceFuture, RelevanceLabel, RelevanceModel};
use halldyll_rag::rag::vector::{DistanceOrder, VectorFuture, VectorHit, VectorSearchClient};
use halldyll_rag::rag::{
    OutputMode, PipelineBackends, PipelineResponse, RagError, RagPipeline, RagResult, SegmentId,
};
use halldyll_rag::server::{self, AppState};
use serde_json::{Value, json};

/// Vector store returning a fixed ranking, or failing when `None`.
struct StaticVector(Option<Vec<&'static str>>);

impl VectorSearchClient for StaticVector {
    fn search<'a>(
        &'a self,
        _embedding: &'a [f32],
        top_k: usize,
    ) -> VectorFuture<'a, RagResult<Vec<VectorHit>>> {
        Box::pin(async move {
            let ids = self
                .0
                .as_ref()
                .ok_or_else(|| RagError::RetrievalUnavailable("connection refused".to_string()))?;
            Ok(ids
                .iter()
                .take(top_k)
                .zip(0u32..)
                .map(|(id, rank)| VectorHit {
                    segment_id: SegmentId::from(*id),
                    distance: f64::from(rank) * 0.1,
                })
                .collect())
        })
    }

    fn distance_order(&self) -> DistanceOrder {
        DistanceOrder::LowerIsBetter
    }
}

/// Judge answering from a table keyed by segment text; unknown text raises.
struct TableJudge(HashMap<&'static str, RagResult<RelevanceLabel>>);

impl RelevanceModel for TableJudge {
    fn judge<'a>(
        &'a self,
        _query_text: &'a str,
        segment_text: &'a str,
    ) -> RelevanceFuture<'a, RagResult<RelevanceLabel>> {
        let outcome = match self.0.get(segment_text) {
            Some(Ok(label)) => Ok(*label),
            Some(Err(err)) => Err(RagError::InvalidQuery(err.to_string())),
            None => Err(RagError::InvalidQuery("unknown segment".to_string())),
        };
        Box::pin(async move { outcome })
    }

    fn model_id(&self) -> &str {
        "table"
    }
}

struct ZeroEmbedder;

impl Embedder for ZeroEmbedder {
    fn embed_query<'a>(&'a self, _text: &'a str) -> EmbedFuture<'a, RagResult<Vec<f32>>> {
        Box::pin(async { Ok(vec![0.0; 384]) })
    }

    fn ndims(&self) -> usize {
        384
    }
}

const QUERY: &str = "what documents are needed for a claim";
const A: &str = "claim form and ID proof required";
const B: &str = "submit signed application";
const C: &str = "office hours are 9 to 5";

fn corpus() -> InMemorySegmentStore {
    let segments = [("A", A), ("B", B), ("C", C)].into_iter().map(|(id, text)| {
        Segment::new(id, "claims.pdf", SegmentPosition::default(), text).expect("valid segment")
    });
    InMemorySegmentStore::new(segments).expect("unique segments")
}

fn judge() -> TableJudge {
    TableJudge(HashMap::from([
        (A, Ok(RelevanceLabel::Relevant)),
        (B, Ok(RelevanceLabel::Relevant)),
        (C, Ok(RelevanceLabel::NotRelevant)),
    ]))
}

fn pipeline(vector: StaticVector, judge: TableJudge) -> RagPipeline {
    let store = corpus();
    let scorer = LexicalScorer::fitted_from(&store).expect("fit");
    let backends = PipelineBackends {
        segments: Arc::new(store),
        scorer: Arc::new(scorer),
        vector: Some(Arc::new(vector)),
        relevance: Arc::new(judge),
        summarizer: None,
    };
    RagPipeline::new(RagConfig::default(), backends).expect("pipeline")
}

fn ids(response: &PipelineResponse) -> Vec<&str> {
    response.results.iter().map(|r| r.segment_id.as_str()).collect()
}

fn scores(response: &PipelineResponse) -> Vec<f64> {
    response.results.iter().map(|r| r.relevance_score).collect()
}

#[tokio::test]
async fn claim_documents_example() {
    let pipeline = pipeline(StaticVector(Some(vec!["A", "B", "C"])), judge());
    let response = pipeline
        .run(QUERY, Some(vec![0.0; 384]), 3, OutputMode::Ranked)
        .await
        .expect("query succeeds");

    assert!(!response.degraded);
    assert_eq!(ids(&response), vec!["A", "B", "C"]);
    assert_eq!(scores(&response), vec![1.0, 1.0, 0.0]);
    assert!(response.results[0].fused_score > response.results[1].fused_score);
    assert!(response.results[1].fused_score > response.results[2].fused_score);
}

#[tokio::test]
async fn vector_outage_degrades_to_lexical() {
    let pipeline = pipeline(StaticVector(None), judge());
    let response = pipeline
        .run(QUERY, Some(vec![0.0; 384]), 2, OutputMode::Ranked)
        .await
        .expect("degraded query still succeeds");

    assert!(response.degraded);
    assert!(!response.results.is_empty());
    assert!(response.results.len() <= 2);
    assert_eq!(response.results[0].segment_id.as_str(), "A");
}

#[tokio::test]
async fn one_failing_judgement_gets_neutral_score() {
    let mut table = judge();
    table
        .0
        .insert(B, Err(RagError::InvalidQuery("model crashed".to_string())));
    let pipeline = pipeline(StaticVector(Some(vec!["A", "B", "C"])), table);
    let response = pipeline
        .run(QUERY, Some(vec![0.0; 384]), 3, OutputMode::Ranked)
        .await
        .expect("rerank failure is isolated");

    assert_eq!(ids(&response), vec!["A", "B", "C"]);
    assert_eq!(scores(&response), vec![1.0, 0.5, 0.0]);
}

#[tokio::test]
async fn repeated_queries_return_identical_order() {
    let pipeline = pipeline(StaticVector(Some(vec!["C", "B", "A"])), judge());
    let first = pipeline
        .run(QUERY, Some(vec![0.0; 384]), 3, OutputMode::Ranked)
        .await
        .expect("query");
    for _ in 0..5 {
        let again = pipeline
            .run(QUERY, Some(vec![0.0; 384]), 3, OutputMode::Ranked)
            .await
            .expect("query");
        assert_eq!(ids(&again), ids(&first));
        assert_eq!(scores(&again), scores(&first));
    }
}

#[tokio::test]
async fn http_query_round_trip() {
    let pipeline = pipeline(StaticVector(Some(vec!["A", "B", "C"])), judge());
    let schema = ExtractionSchema::from_categories(["issue"]).expect("schema");
    let notes = LlmNotesExtractor::new(&RagConfig::default().notes, schema).expect("notes client");
    let embedder: Arc<dyn Embedder> = Arc::new(ZeroEmbedder);
    let state = AppState::new(pipeline, Some(embedder), Arc::new(notes));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(server::serve(listener, state, std::future::pending()));

    let client = reqwest::Client::new();
    let body: Value = client
        .post(format!("http://{addr}/query"))
        .json(&json!({ "query": QUERY, "top_k": 2 }))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json body");

    assert_eq!(body["query"], QUERY);
    assert_eq!(body["degraded"], false);
    let results = body["results"].as_array().expect("results array");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["segment_id"], "A");
    assert_eq!(results[0]["relevance_score"], 1.0);
    assert_eq!(results[0]["source_text"], A);

    let categories: Value = client
        .get(format!("http://{addr}/extraction_categories"))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json body");
    assert_eq!(categories["categories"], json!(["issue"]));
}

#[tokio::test]
async fn pipeline_runs_on_spawned_tasks() {
    let pipeline = Arc::new(pipeline(StaticVector(Some(vec!["A", "B", "C"])), judge()));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move {
                pipeline
                    .run(QUERY, Some(vec![0.0; 384]), 3, OutputMode::Ranked)
                    .await
            })
        })
        .collect();
    for handle in handles {
        let response = handle.await.expect("task").expect("query");
        assert_eq!(ids(&response), vec!["A", "B", "C"]);
    }
}

#[tokio::test]
async fn server_stops_on_shutdown_signal() {
    let pipeline = pipeline(StaticVector(None), judge());
    let schema = ExtractionSchema::from_categories(["issue"]).expect("schema");
    let notes = LlmNotesExtractor::new(&RagConfig::default().notes, schema).expect("notes client");
    let state = AppState::new(pipeline, None, Arc::new(notes));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");

    let result = server::serve(listener, state, async {}).await;
    assert!(result.is_ok());
}
