//! Summarization of ranked results.

pub mod summarizer;

pub use summarizer::{LlmSummarizer, SummarizeFuture, Summarizer};
