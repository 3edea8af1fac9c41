//! Query embedding models.

pub mod embedder;

pub use embedder::{EmbedFuture, Embedder, OllamaEmbedder};
