//! LLM summarization of the top-ranked segments.

use std::future::Future;
use std::pin::Pin;

use reqwest::Client as ReqwestClient;
use rig::client::CompletionClient;
use rig::completion::CompletionModel;
use rig::message::AssistantContent;
use rig::providers::ollama;
use tracing::debug;

use crate::rag::core::config::SummarizationConfig;
use crate::rag::core::errors::{RagError, RagResult};

/// Boxed future type for summarizer calls.
pub type SummarizeFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Produces a natural-language summary of retrieved segments.
pub trait Summarizer: Send + Sync {
    /// Summarize `segments` in light of `query_text`.
    ///
    /// # Errors
    /// Returns `SummarizationError` if the external call fails.
    fn summarize<'a>(
        &'a self,
        query_text: &'a str,
        segments: &'a [String],
    ) -> SummarizeFuture<'a, RagResult<String>>;
}

/// Summarizer backed by an Ollama completion model.
pub struct LlmSummarizer {
    model: ollama::CompletionModel,
    prompt: String,
    max_input_chars: usize,
}

impl LlmSummarizer {
    /// Create a new LLM summarizer.
    ///
    /// # Errors
    /// Returns an error if the Ollama client cannot be built.
    pub fn new(config: &SummarizationConfig) -> RagResult<Self> {
        let builder = ollama::Client::<ReqwestClient>::builder().api_key(rig::client::Nothing);
        let builder = if let Some(base_url) = &config.base_url {
            builder.base_url(base_url)
        } else {
            builder
        };
        let client = builder.build().map_err(RagError::from)?;
        let model = client.completion_model(config.model.clone());

        Ok(Self {
            model,
            prompt: config.prompt.clone(),
            max_input_chars: config.max_input_chars,
        })
    }

    async fn run(&self, query_text: &str, segments: &[String]) -> RagResult<String> {
        if segments.is_empty() {
            return Ok(String::new());
        }

        let context = build_context(segments, self.max_input_chars);
        let prompt = format!("{}\n\n{context}", self.prompt);

        debug!("Summarizing {} segments with LLM", segments.len());

        let request = self
            .model
            .completion_request(prompt)
            .preamble(format!("The user asked: {query_text}"))
            .temperature(0.3)
            .build();

        let response = self
            .model
            .completion(request)
            .await
            .map_err(|err| RagError::SummarizationError(err.to_string()))?;
        let text = extract_text(&response.choice);
        if text.trim().is_empty() {
            return Err(RagError::SummarizationError(
                "model returned an empty summary".to_string(),
            ));
        }
        Ok(text.trim().to_string())
    }
}

impl Summarizer for LlmSummarizer {
    fn summarize<'a>(
        &'a self,
        query_text: &'a str,
        segments: &'a [String],
    ) -> SummarizeFuture<'a, RagResult<String>> {
        Box::pin(self.run(query_text, segments))
    }
}

/// Extract text from assistant response.
fn extract_text(choice: &rig::OneOrMany<AssistantContent>) -> String {
    let mut out = String::new();
    for content in choice.iter() {
        if let AssistantContent::Text(text) = content {
            out.push_str(&text.text);
        }
    }
    out
}

/// Join segments with single spaces, cut to `max_chars` characters.
fn build_context(segments: &[String], max_chars: usize) -> String {
    let joined = segments
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    truncate_to_chars(&joined, max_chars)
}

/// Truncate a string to a maximum number of characters.
fn truncate_to_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_context_joins_with_spaces() {
        let segments = vec![
            "Claim form and hospital bills are required.".to_string(),
            "  ".to_string(),
            "You need your ID proof.".to_string(),
        ];
        assert_eq!(
            build_context(&segments, 1000),
            "Claim form and hospital bills are required. You need your ID proof."
        );
    }

    #[test]
    fn test_build_context_truncates() {
        let segments = vec!["abcdef".to_string(), "ghij".to_string()];
        assert_eq!(build_context(&segments, 8), "abcdef g");
    }

    #[test]
    fn test_truncate_to_chars() {
        let text = "Hello, world!";
        assert_eq!(truncate_to_chars(text, 5), "Hello");
        assert_eq!(truncate_to_chars(text, 100), text);
    }

    #[tokio::test]
    async fn test_empty_input_skips_model() {
        let config = SummarizationConfig {
            base_url: Some("http://127.0.0.1:1".to_string()),
            ..SummarizationConfig::default()
        };
        let Ok(summarizer) = LlmSummarizer::new(&config) else {
            unreachable!("client builds without network");
        };
        let summary = summarizer.summarize("q", &[]).await;
        assert_eq!(summary.ok().as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_unreachable_model_is_summarization_error() {
        let config = SummarizationConfig {
            base_url: Some("http://127.0.0.1:1".to_string()),
            ..SummarizationConfig::default()
        };
        let Ok(summarizer) = LlmSummarizer::new(&config) else {
            unreachable!("client builds without network");
        };
        let segments = vec!["claim form".to_string()];
        let summary = summarizer.summarize("q", &segments).await;
        assert!(matches!(summary, Err(RagError::SummarizationError(_))));
    }
}
