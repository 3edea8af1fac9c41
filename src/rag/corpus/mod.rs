//! Corpus access for the pipeline.

pub mod store;

pub use store::{InMemorySegmentStore, SegmentStore};
