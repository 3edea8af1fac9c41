//! Application state shared across all request handlers.

use std::sync::Arc;

use tracing::{info, warn};

use crate::rag::core::config::RagConfig;
use crate::rag::core::errors::RagResult;
use crate::rag::embedding::embedder::{Embedder, OllamaEmbedder};
use crate::rag::engine::pipeline::RagPipeline;
use crate::rag::notes::extraction::{ExtractionSchema, LlmNotesExtractor, NotesExtractor};

/// Shared application state.
pub struct AppState {
    /// Query pipeline.
    pub pipeline: RagPipeline,
    /// Query embedder; `None` means vector search is skipped.
    pub embedder: Option<Arc<dyn Embedder>>,
    /// Notes extractor for `/process_notes`.
    pub notes: Arc<dyn NotesExtractor>,
}

impl AppState {
    /// Create state from already-built components.
    #[must_use]
    pub fn new(
        pipeline: RagPipeline,
        embedder: Option<Arc<dyn Embedder>>,
        notes: Arc<dyn NotesExtractor>,
    ) -> Arc<Self> {
        Arc::new(Self {
            pipeline,
            embedder,
            notes,
        })
    }

    /// Build the pipeline and every client from configuration.
    ///
    /// # Errors
    /// Returns an error if the corpus, schema or any client cannot be initialized.
    pub fn from_config(config: RagConfig) -> RagResult<Arc<Self>> {
        let schema = ExtractionSchema::from_config(&config.notes)?;
        let notes: Arc<dyn NotesExtractor> = Arc::new(LlmNotesExtractor::new(&config.notes, schema)?);

        let embedder: Option<Arc<dyn Embedder>> = if config.vector_store.endpoint.is_some() {
            Some(Arc::new(OllamaEmbedder::new(&config.embedding)?))
        } else {
            warn!("Vector store disabled, skipping query embedding");
            None
        };

        let pipeline = RagPipeline::from_config(config)?;
        info!("RAG pipeline ready");

        Ok(Self::new(pipeline, embedder, notes))
    }
}
