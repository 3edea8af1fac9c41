//! Nearest-neighbour search against the external vector store.

pub mod client;
pub mod milvus;

pub use client::{DistanceOrder, VectorFuture, VectorHit, VectorSearchClient};
pub use milvus::MilvusVectorClient;
