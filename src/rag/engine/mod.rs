//! Pipeline orchestration.

pub mod pipeline;

pub use pipeline::{OutputMode, PipelineBackends, PipelineResponse, RagPipeline, RankedSegment};
