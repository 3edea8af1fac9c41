//! Configuration for the retrieval pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::rag::core::errors::{RagError, RagResult};
use crate::rag::vector::client::DistanceOrder;

/// Environment variable pointing at a JSON config file.
pub const CONFIG_PATH_ENV: &str = "HALLDYLL_RAG_CONFIG";
/// Environment variable for the vector store endpoint.
pub const MILVUS_ENDPOINT_ENV: &str = "MILVUS_PUBLIC_ENDPOINT";
/// Environment variable for the vector store token.
pub const MILVUS_API_KEY_ENV: &str = "MILVUS_API_KEY";
/// Environment variable for the Ollama base URL shared by all model clients.
pub const OLLAMA_URL_ENV: &str = "HALLDYLL_OLLAMA_URL";
/// Environment variable for the corpus manifest path.
pub const CORPUS_PATH_ENV: &str = "HALLDYLL_RAG_CORPUS";
/// Environment variable for the server port.
pub const PORT_ENV: &str = "HALLDYLL_RAG_PORT";

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Retrieval and fusion settings.
    pub retrieval: RetrievalConfig,
    /// Vector store connection settings.
    pub vector_store: VectorStoreConfig,
    /// Query embedding model settings.
    pub embedding: EmbeddingConfig,
    /// Relevance model settings.
    pub relevance: RelevanceConfig,
    /// Summarization settings.
    pub summarization: SummarizationConfig,
    /// Corpus location.
    pub corpus: CorpusConfig,
    /// Note extraction settings.
    pub notes: NotesConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
}

impl RagConfig {
    /// Load a configuration from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> RagResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Build the configuration from `HALLDYLL_RAG_CONFIG` (if set) and env overrides.
    ///
    /// # Errors
    /// Returns an error if the config file is unreadable or an override is malformed.
    pub fn from_env() -> RagResult<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    ///
    /// # Errors
    /// Returns an error if the port override is not a valid `u16`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> RagResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup(MILVUS_ENDPOINT_ENV) {
            self.vector_store.endpoint = Some(endpoint);
        }
        if let Some(api_key) = lookup(MILVUS_API_KEY_ENV) {
            self.vector_store.api_key = Some(api_key);
        }
        if let Some(base_url) = lookup(OLLAMA_URL_ENV) {
            self.embedding.base_url = Some(base_url.clone());
            self.relevance.base_url = Some(base_url.clone());
            self.summarization.base_url = Some(base_url.clone());
            self.notes.base_url = Some(base_url);
        }
        if let Some(path) = lookup(CORPUS_PATH_ENV) {
            self.corpus.manifest_path = Some(PathBuf::from(path));
        }
        if let Some(port) = lookup(PORT_ENV) {
            self.server.port = port
                .parse()
                .map_err(|_| RagError::InvalidConfig(format!("{PORT_ENV} must be a port, got {port}")))?;
        }
        Ok(())
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> RagResult<()> {
        if self.retrieval.top_k == 0 {
            return Err(RagError::InvalidConfig(
                "retrieval.top_k must be > 0".to_string(),
            ));
        }

        if self.retrieval.max_top_k < self.retrieval.top_k {
            return Err(RagError::InvalidConfig(
                "retrieval.max_top_k must be >= retrieval.top_k".to_string(),
            ));
        }

        if self.retrieval.fanout == 0 {
            return Err(RagError::InvalidConfig(
                "retrieval.fanout must be >= 1".to_string(),
            ));
        }

        if !self.retrieval.rrf_k.is_finite() || self.retrieval.rrf_k < 0.0 {
            return Err(RagError::InvalidConfig(
                "retrieval.rrf_k must be a finite value >= 0".to_string(),
            ));
        }

        if self.vector_store.dimension == 0 {
            return Err(RagError::InvalidConfig(
                "vector_store.dimension must be > 0".to_string(),
            ));
        }

        if self.embedding.ndims != self.vector_store.dimension {
            return Err(RagError::InvalidConfig(format!(
                "embedding.ndims ({}) must equal vector_store.dimension ({})",
                self.embedding.ndims, self.vector_store.dimension
            )));
        }

        if self.vector_store.timeout_ms == 0 {
            return Err(RagError::InvalidConfig(
                "vector_store.timeout_ms must be > 0".to_string(),
            ));
        }

        if self.relevance.max_concurrency == 0 {
            return Err(RagError::InvalidConfig(
                "relevance.max_concurrency must be > 0".to_string(),
            ));
        }

        for base_url in [
            &self.vector_store.endpoint,
            &self.embedding.base_url,
            &self.relevance.base_url,
            &self.summarization.base_url,
            &self.notes.base_url,
        ]
        .into_iter()
        .flatten()
        {
            Url::parse(base_url)?;
        }

        Ok(())
    }
}

/// Retrieval and fusion settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Default number of results when the caller does not specify one.
    pub top_k: usize,
    /// Hard cap on any requested `top_k`.
    pub max_top_k: usize,
    /// Each backend is asked for `top_k * fanout` results before fusion.
    pub fanout: usize,
    /// Constant added to every rank in reciprocal-rank fusion (0 = plain `1/rank`).
    pub rrf_k: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_top_k: 50,
            fanout: 2,
            rrf_k: 0.0,
        }
    }
}

/// Vector store connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Milvus REST endpoint. Vector search is disabled when absent.
    pub endpoint: Option<String>,
    /// Bearer token.
    pub api_key: Option<String>,
    /// Collection holding segment embeddings.
    pub collection: String,
    /// Vector field searched.
    pub anns_field: String,
    /// Primary-key field carrying the segment id.
    pub id_field: String,
    /// Embedding dimension.
    pub dimension: usize,
    /// Whether lower or higher distances are better for the collection metric.
    pub distance_order: DistanceOrder,
    /// Per-call timeout; past it the query degrades to lexical-only.
    pub timeout_ms: u64,
    /// Number of IVF clusters searched per query.
    pub nprobe: u32,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            collection: "document_embeddings".to_string(),
            anns_field: "embedding".to_string(),
            id_field: "chunk_id".to_string(),
            dimension: 384,
            distance_order: DistanceOrder::LowerIsBetter,
            timeout_ms: 2_000,
            nprobe: 10,
        }
    }
}

/// Query embedding model settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Ollama embedding model name.
    pub model: String,
    /// Embedding vector dimensions.
    pub ndims: usize,
    /// Optional custom base URL.
    pub base_url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-minilm".to_string(),
            ndims: 384,
            base_url: None,
        }
    }
}

/// Relevance model settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceConfig {
    /// Relevance model identifier.
    pub model: String,
    /// Optional custom base URL.
    pub base_url: Option<String>,
    /// Maximum candidates scored concurrently.
    pub max_concurrency: usize,
    /// Segment text is cut to this many characters before scoring.
    pub max_document_chars: usize,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            model: "monot5-base-msmarco".to_string(),
            base_url: None,
            max_concurrency: 4,
            max_document_chars: 2_000,
        }
    }
}

/// Summarization settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizationConfig {
    /// Whether a summarizer is built at startup.
    pub enabled: bool,
    /// Completion model name.
    pub model: String,
    /// Optional custom base URL.
    pub base_url: Option<String>,
    /// Instruction placed before the retrieved context.
    pub prompt: String,
    /// Maximum context size in characters.
    pub max_input_chars: usize,
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "ministral-3:8b-instruct-2512-q8_0".to_string(),
            base_url: None,
            prompt: "Summarize the following text:".to_string(),
            max_input_chars: 8_000,
        }
    }
}

/// Corpus location.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// JSON-lines file with one segment per line.
    pub manifest_path: Option<PathBuf>,
    /// Directory of processed chunk files, used when no manifest is set.
    pub chunk_dir: Option<PathBuf>,
}

/// Structured note extraction settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesConfig {
    /// Categories to extract.
    pub categories: Vec<String>,
    /// Optional `extraction_config.json` overriding `categories`.
    pub categories_path: Option<PathBuf>,
    /// Completion model name.
    pub model: String,
    /// Optional custom base URL.
    pub base_url: Option<String>,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            categories: vec![
                "customer name".to_string(),
                "issue".to_string(),
                "action taken".to_string(),
                "follow up".to_string(),
            ],
            categories_path: None,
            model: "ministral-3:8b-instruct-2512-q8_0".to_string(),
            base_url: None,
        }
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RagConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_fanout() {
        let mut config = RagConfig::default();
        config.retrieval.fanout = 0;
        assert!(matches!(config.validate(), Err(RagError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_dimension_mismatch() {
        let mut config = RagConfig::default();
        config.embedding.ndims = 768;
        assert!(matches!(config.validate(), Err(RagError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        let mut config = RagConfig::default();
        config.vector_store.endpoint = Some("not a url".to_string());
        assert!(matches!(config.validate(), Err(RagError::Url(_))));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{"retrieval":{"top_k":3},"vector_store":{"distance_order":"higher_is_better"}}"#;
        let config: RagConfig = serde_json::from_str(json).unwrap_or_default();
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.fanout, 2);
        assert_eq!(config.vector_store.distance_order, DistanceOrder::HigherIsBetter);
        assert_eq!(config.vector_store.dimension, 384);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (MILVUS_ENDPOINT_ENV, "https://milvus.example.com"),
            (OLLAMA_URL_ENV, "http://10.0.0.5:11434"),
            (PORT_ENV, "8080"),
        ]);
        let mut config = RagConfig::default();
        let applied = config.apply_overrides(|key| env.get(key).map(|v| (*v).to_string()));
        assert!(applied.is_ok());
        assert_eq!(config.vector_store.endpoint.as_deref(), Some("https://milvus.example.com"));
        assert_eq!(config.relevance.base_url.as_deref(), Some("http://10.0.0.5:11434"));
        assert_eq!(config.summarization.base_url.as_deref(), Some("http://10.0.0.5:11434"));
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_bad_port_override() {
        let mut config = RagConfig::default();
        let applied = config.apply_overrides(|key| (key == PORT_ENV).then(|| "http".to_string()));
        assert!(matches!(applied, Err(RagError::InvalidConfig(_))));
    }
}
