//! Query embedding model wrapper for Rig + Ollama.

use std::future::Future;
use std::pin::Pin;

use reqwest::Client as ReqwestClient;
use rig::client::{EmbeddingsClient, Nothing};
use rig::embeddings::EmbeddingModel;
use rig::providers::ollama;

use crate::rag::core::config::EmbeddingConfig;
use crate::rag::core::errors::{RagError, RagResult};

/// Boxed future type for embedder operations.
pub type EmbedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait abstraction over query embedding models.
pub trait Embedder: Send + Sync {
    /// Embed a single query string.
    ///
    /// # Errors
    /// Returns an error if the embedding request fails.
    fn embed_query<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, RagResult<Vec<f32>>>;
    /// Return embedding dimensionality.
    fn ndims(&self) -> usize;
}

type OllamaEmbeddingModel = ollama::EmbeddingModel<ReqwestClient>;

/// Ollama embedder using the Rig provider.
#[derive(Clone)]
pub struct OllamaEmbedder {
    model: OllamaEmbeddingModel,
    ndims: usize,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder from config.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the client cannot be built.
    pub fn new(config: &EmbeddingConfig) -> RagResult<Self> {
        let builder = ollama::Client::<ReqwestClient>::builder().api_key(Nothing);
        let builder = if let Some(base_url) = &config.base_url {
            builder.base_url(base_url)
        } else {
            builder
        };
        let client = builder.build().map_err(RagError::from)?;
        let model = client.embedding_model_with_ndims(config.model.clone(), config.ndims);
        Ok(Self {
            model,
            ndims: config.ndims,
        })
    }
}

impl Embedder for OllamaEmbedder {
    fn embed_query<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, RagResult<Vec<f32>>> {
        Box::pin(async move {
            let embedding = self
                .model
                .embed_text(text)
                .await
                .map_err(RagError::Embedding)?;
            let vector = to_f32(&embedding.vec);
            if vector.len() != self.ndims {
                return Err(RagError::DimensionMismatch {
                    expected: self.ndims,
                    actual: vector.len(),
                });
            }
            Ok(vector)
        })
    }

    fn ndims(&self) -> usize {
        self.ndims
    }
}

#[allow(clippy::cast_possible_truncation)] // Embedding components fit in f32 range.
fn to_f32(values: &[f64]) -> Vec<f32> {
    values.iter().map(|v| *v as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_f32() {
        assert_eq!(to_f32(&[0.5, -1.0]), vec![0.5_f32, -1.0]);
    }

    #[test]
    fn test_new_reports_dimensions() {
        let config = EmbeddingConfig {
            base_url: Some("http://127.0.0.1:11434".to_string()),
            ..EmbeddingConfig::default()
        };
        let embedder = OllamaEmbedder::new(&config).ok();
        assert_eq!(embedder.map(|e| e.ndims()), Some(384));
    }
}
