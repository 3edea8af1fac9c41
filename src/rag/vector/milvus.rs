//! Milvus REST (v2) vector search client.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::rag::core::config::VectorStoreConfig;
use crate::rag::core::errors::{RagError, RagResult};
use crate::rag::core::ids::SegmentId;
use crate::rag::vector::client::{DistanceOrder, VectorFuture, VectorHit, VectorSearchClient};

/// Search path relative to the endpoint, kept relative so proxy prefixes survive.
const SEARCH_PATH: &str = "v2/vectordb/entities/search";

/// Connection timeout for the vector store.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Vector search client for a Milvus / Zilliz collection.
pub struct MilvusVectorClient {
    client: reqwest::Client,
    search_url: url::Url,
    api_key: Option<String>,
    collection: String,
    anns_field: String,
    id_field: String,
    dimension: usize,
    nprobe: u32,
    distance_order: DistanceOrder,
}

impl MilvusVectorClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    /// Returns an error if the endpoint is missing or invalid, or the HTTP client cannot be built.
    pub fn new(config: &VectorStoreConfig) -> RagResult<Self> {
        let endpoint = config.endpoint.as_deref().ok_or_else(|| {
            RagError::InvalidConfig("vector_store.endpoint is not set".to_string())
        })?;
        let search_url = search_url(endpoint)?;

        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            search_url,
            api_key: config.api_key.clone(),
            collection: config.collection.clone(),
            anns_field: config.anns_field.clone(),
            id_field: config.id_field.clone(),
            dimension: config.dimension,
            nprobe: config.nprobe,
            distance_order: config.distance_order,
        })
    }

    fn build_request<'a>(&'a self, embedding: &'a [f32], top_k: usize) -> SearchRequest<'a> {
        SearchRequest {
            collection_name: &self.collection,
            data: [embedding],
            anns_field: &self.anns_field,
            limit: top_k,
            output_fields: [self.id_field.as_str()],
            search_params: SearchParams {
                params: IvfParams {
                    nprobe: self.nprobe,
                },
            },
        }
    }

    async fn execute(&self, embedding: &[f32], top_k: usize) -> RagResult<Vec<VectorHit>> {
        if embedding.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let mut request = self
            .client
            .post(self.search_url.clone())
            .header("accept", "application/json")
            .json(&self.build_request(embedding, top_k));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(unavailable)?;
        if !response.status().is_success() {
            return Err(RagError::RetrievalUnavailable(format!(
                "vector store returned status {}",
                response.status()
            )));
        }

        let body: SearchResponse = response.json().await.map_err(unavailable)?;
        let mut hits = parse_hits(body, &self.id_field)?;
        if hits.is_empty() {
            debug!("Vector store returned no hits for collection {}", self.collection);
        }
        self.distance_order.rank(&mut hits);
        hits.truncate(top_k);
        Ok(hits)
    }
}

impl VectorSearchClient for MilvusVectorClient {
    fn search<'a>(
        &'a self,
        embedding: &'a [f32],
        top_k: usize,
    ) -> VectorFuture<'a, RagResult<Vec<VectorHit>>> {
        Box::pin(self.execute(embedding, top_k))
    }

    fn distance_order(&self) -> DistanceOrder {
        self.distance_order
    }
}

/// Resolve the search URL under the endpoint path.
fn search_url(endpoint: &str) -> RagResult<url::Url> {
    let mut base = url::Url::parse(endpoint)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join(SEARCH_PATH)?)
}

fn unavailable(err: reqwest::Error) -> RagError {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    RagError::RetrievalUnavailable(format!("{kind}: {err}"))
}

/// Convert a Milvus search response into hits.
fn parse_hits(body: SearchResponse, id_field: &str) -> RagResult<Vec<VectorHit>> {
    if body.code != 0 {
        return Err(RagError::RetrievalUnavailable(format!(
            "vector store error {}: {}",
            body.code,
            body.message.unwrap_or_default()
        )));
    }

    let mut hits = Vec::with_capacity(body.data.len());
    for row in body.data {
        let id = row
            .get(id_field)
            .or_else(|| row.get("id"))
            .and_then(value_to_id)
            .ok_or_else(|| {
                RagError::RetrievalUnavailable(format!("search hit without `{id_field}`"))
            })?;
        let distance = row
            .get("distance")
            .and_then(Value::as_f64)
            .ok_or_else(|| RagError::RetrievalUnavailable("search hit without distance".to_string()))?;
        hits.push(VectorHit {
            segment_id: SegmentId::new(id),
            distance,
        });
    }
    Ok(hits)
}

fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    collection_name: &'a str,
    data: [&'a [f32]; 1],
    anns_field: &'a str,
    limit: usize,
    output_fields: [&'a str; 1],
    search_params: SearchParams,
}

#[derive(Serialize)]
struct SearchParams {
    params: IvfParams,
}

#[derive(Serialize)]
struct IvfParams {
    nprobe: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Vec<Map<String, Value>>,
}
