//! Relevance model abstraction and the Ollama-backed judge.
//!
//! The judge follows the monoT5 protocol: it is shown
//! `Query: {q} Document: {d} Relevant:` and answers `true` or `false`.

use std::future::Future;
use std::pin::Pin;

use reqwest::Client as ReqwestClient;
use rig::client::CompletionClient;
use rig::completion::CompletionModel;
use rig::message::AssistantContent;
use rig::providers::ollama;
use serde::{Deserialize, Serialize};

use crate::rag::core::candidate::NEUTRAL_RELEVANCE;
use crate::rag::core::config::RelevanceConfig;
use crate::rag::core::errors::{RagError, RagResult};

/// Boxed future type for relevance model calls.
pub type RelevanceFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const JUDGE_PREAMBLE: &str = "You judge search results. Reply with exactly one word: true if the document answers the query, false otherwise.";

/// Label produced by a relevance model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceLabel {
    /// Document is relevant to the query.
    Relevant,
    /// Document is not relevant.
    NotRelevant,
    /// Model produced something else.
    Other,
}

impl RelevanceLabel {
    /// Map the label to a score in [0, 1].
    #[must_use]
    pub const fn score(self) -> f64 {
        match self {
            Self::Relevant => 1.0,
            Self::NotRelevant => 0.0,
            Self::Other => NEUTRAL_RELEVANCE,
        }
    }

    /// Interpret raw model output.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();
        let cleaned = lowered.trim_matches(|c: char| !c.is_alphanumeric() && c != '_');
        let joined = cleaned.replace([' ', '-'], "_");
        Self::from_word(&joined)
            .or_else(|| cleaned.split_whitespace().next().and_then(Self::from_word))
            .unwrap_or(Self::Other)
    }

    fn from_word(word: &str) -> Option<Self> {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '_');
        match word {
            "true" | "relevant" | "yes" => Some(Self::Relevant),
            "false" | "not_relevant" | "irrelevant" | "no" => Some(Self::NotRelevant),
            _ => None,
        }
    }
}

/// Relevance model judging one (query, segment) pair at a time.
pub trait RelevanceModel: Send + Sync {
    /// Judge whether `segment_text` is relevant to `query_text`.
    ///
    /// # Errors
    /// Returns an error if the model call fails.
    fn judge<'a>(
        &'a self,
        query_text: &'a str,
        segment_text: &'a str,
    ) -> RelevanceFuture<'a, RagResult<RelevanceLabel>>;

    /// Model identifier, for logs.
    fn model_id(&self) -> &str;
}

/// Relevance judge backed by an Ollama completion model.
pub struct OllamaRelevanceModel {
    model: ollama::CompletionModel,
    model_id: String,
    max_document_chars: usize,
}

impl OllamaRelevanceModel {
    /// Create a judge from configuration.
    ///
    /// # Errors
    /// Returns an error if the Ollama client cannot be built.
    pub fn new(config: &RelevanceConfig) -> RagResult<Self> {
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
            model_id: config.model.clone(),
            max_document_chars: config.max_document_chars,
        })
    }
}

impl RelevanceModel for OllamaRelevanceModel {
    fn judge<'a>(
        &'a self,
        query_text: &'a str,
        segment_text: &'a str,
    ) -> RelevanceFuture<'a, RagResult<RelevanceLabel>> {
        Box::pin(async move {
            let prompt = format_judge_prompt(query_text, segment_text, self.max_document_chars);
            let request = self
                .model
                .completion_request(prompt)
                .preamble(JUDGE_PREAMBLE.to_string())
                .temperature(0.0)
                .max_tokens(4)
                .build();
            let response = self.model.completion(request).await?;
            Ok(RelevanceLabel::parse(&extract_text(&response.choice)))
        })
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Build the monoT5-style prompt, cutting the document to `max_chars`.
fn format_judge_prompt(query_text: &str, segment_text: &str, max_chars: usize) -> String {
    let document: String = segment_text.chars().take(max_chars).collect();
    format!("Query: {query_text} Document: {document} Relevant:")
}

fn extract_text(choice: &rig::OneOrMany<AssistantContent>) -> String {
    let mut out = String::new();
    for content in choice.iter() {
        if let AssistantContent::Text(text) = content {
            out.push_str(&text.text);
        }
    }
    out
}
