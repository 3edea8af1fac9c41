//! Structured note extraction.
//!
//! Free-text notes are summarized and split into a fixed set of categories.
//! The category set is validated once, when the schema is built, so every
//! request is checked against the same field names.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use reqwest::Client as ReqwestClient;
use rig::client::CompletionClient;
use rig::completion::CompletionModel;
use rig::message::AssistantContent;
use rig::providers::ollama;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::rag::core::config::NotesConfig;
use crate::rag::core::errors::{RagError, RagResult};

/// Boxed future type for note extraction calls.
pub type NotesFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One category and the JSON field it is reported under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionField {
    /// Human-readable category ("customer name").
    pub category: String,
    /// Field name in the output ("customer_name").
    pub field: String,
}

/// Validated set of extraction categories.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionSchema {
    fields: Vec<ExtractionField>,
}

#[derive(Deserialize)]
struct CategoriesFile {
    extraction_categories: Vec<String>,
}

impl ExtractionSchema {
    /// Build a schema from category names.
    ///
    /// # Errors
    /// Returns `InvalidConfig` for an empty list, a blank category, or two
    /// categories that map to the same field name.
    pub fn from_categories<I, S>(categories: I) -> RagResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields = Vec::new();
        let mut seen = BTreeSet::new();
        for category in categories {
            let category: String = category.into();
            let category = category.trim().to_string();
            if category.is_empty() {
                return Err(RagError::InvalidConfig(
                    "extraction category must not be blank".to_string(),
                ));
            }
            let field = field_name(&category);
            if !seen.insert(field.clone()) {
                return Err(RagError::InvalidConfig(format!(
                    "extraction field '{field}' is defined twice"
                )));
            }
            fields.push(ExtractionField { category, field });
        }
        if fields.is_empty() {
            return Err(RagError::InvalidConfig(
                "at least one extraction category is required".to_string(),
            ));
        }
        Ok(Self { fields })
    }

    /// Build the schema from configuration, preferring `categories_path`.
    ///
    /// # Errors
    /// Returns an error if the categories file is unreadable or the list is invalid.
    pub fn from_config(config: &NotesConfig) -> RagResult<Self> {
        match &config.categories_path {
            Some(path) => Self::from_categories(load_categories(path)?),
            None => Self::from_categories(config.categories.iter().cloned()),
        }
    }

    /// Fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[ExtractionField] {
        &self.fields
    }

    /// Category names in declaration order.
    #[must_use]
    pub fn categories(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.category.clone()).collect()
    }

    /// Prompt asking for the strict JSON reply.
    #[must_use]
    pub fn build_prompt(&self, notes: &str) -> String {
        let category_list = self
            .fields
            .iter()
            .map(|f| format!("- {}", f.category))
            .collect::<Vec<_>>()
            .join("\n");
        let detail_shape = self
            .fields
            .iter()
            .map(|f| format!("\"{}\": \"Extracted information for {}\"", f.field, f.category))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "Summarize the following notes and extract key details for these categories:\n\
             {category_list}\n\n\
             The output must be valid JSON and strictly follow this format:\n\
             {{\"summary\": \"A brief summary of the conversation\", \"details\": {{{detail_shape}}}}}\n\n\
             Do not include any text outside of this JSON structure.\n\n\
             Notes: {notes}"
        )
    }

    /// Validate a model reply against the schema.
    ///
    /// Fields outside the schema are dropped.
    ///
    /// # Errors
    /// Returns `NotesExtraction` if the reply is not JSON or a field is missing.
    pub fn parse_response(&self, raw: &str) -> RagResult<NotesExtraction> {
        let body = json_body(raw).ok_or_else(|| {
            RagError::NotesExtraction("model reply contains no JSON object".to_string())
        })?;
        let value: Value = serde_json::from_str(body)
            .map_err(|err| RagError::NotesExtraction(format!("invalid JSON: {err}")))?;

        let summary = value
            .get("summary")
            .and_then(Value::as_str)
            .ok_or_else(|| RagError::NotesExtraction("missing field 'summary'".to_string()))?
            .to_string();
        let raw_details = value
            .get("details")
            .and_then(Value::as_object)
            .ok_or_else(|| RagError::NotesExtraction("missing field 'details'".to_string()))?;

        let mut details = BTreeMap::new();
        for field in &self.fields {
            let text = match raw_details.get(&field.field) {
                Some(Value::String(text)) => text.clone(),
                Some(Value::Null) | None => {
                    return Err(RagError::NotesExtraction(format!(
                        "missing field '{}'",
                        field.field
                    )));
                }
                Some(other) => other.to_string(),
            };
            details.insert(field.field.clone(), text);
        }

        Ok(NotesExtraction { summary, details })
    }
}

/// Extracted summary and per-category details.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotesExtraction {
    /// Brief summary of the notes.
    pub summary: String,
    /// Field name to extracted text.
    pub details: BTreeMap<String, String>,
}

/// Turns free-text notes into a [`NotesExtraction`].
pub trait NotesExtractor: Send + Sync {
    /// Extract summary and details from `notes`.
    ///
    /// # Errors
    /// Returns an error if the model call fails or the reply does not match the schema.
    fn extract<'a>(&'a self, notes: &'a str) -> NotesFuture<'a, RagResult<NotesExtraction>>;

    /// Schema replies are validated against.
    fn schema(&self) -> &ExtractionSchema;
}

/// Notes extractor backed by an Ollama completion model.
pub struct LlmNotesExtractor {
    model: ollama::CompletionModel,
    schema: ExtractionSchema,
}

impl LlmNotesExtractor {
    /// Create an extractor for `schema`.
    ///
    /// # Errors
    /// Returns an error if the Ollama client cannot be built.
    pub fn new(config: &NotesConfig, schema: ExtractionSchema) -> RagResult<Self> {
        let builder = ollama::Client::<ReqwestClient>::builder().api_key(rig::client::Nothing);
        let builder = if let Some(base_url) = &config.base_url {
            builder.base_url(base_url)
        } else {
            builder
        };
        let client = builder.build().map_err(RagError::from)?;
        let model = client.completion_model(config.model.clone());
        Ok(Self { model, schema })
    }

    async fn run(&self, notes: &str) -> RagResult<NotesExtraction> {
        if notes.trim().is_empty() {
            return Err(RagError::InvalidQuery("notes text must not be empty".to_string()));
        }
        let request = self
            .model
            .completion_request(self.schema.build_prompt(notes))
            .preamble("You are a BPO assistant. Reply with JSON only.".to_string())
            .temperature(0.0)
            .build();
        let response = self
            .model
            .completion(request)
            .await
            .map_err(|err| RagError::NotesExtraction(err.to_string()))?;
        let text = extract_text(&response.choice);
        debug!("Notes model replied with {} chars", text.len());
        self.schema.parse_response(&text)
    }
}

impl NotesExtractor for LlmNotesExtractor {
    fn extract<'a>(&'a self, notes: &'a str) -> NotesFuture<'a, RagResult<NotesExtraction>> {
        Box::pin(self.run(notes))
    }

    fn schema(&self) -> &ExtractionSchema {
        &self.schema
    }
}

/// Read categories from a `{"extraction_categories": [...]}` file.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn load_categories(path: impl AsRef<Path>) -> RagResult<Vec<String>> {
    let raw = std::fs::read_to_string(path)?;
    let file: CategoriesFile = serde_json::from_str(&raw)?;
    Ok(file.extraction_categories)
}

fn field_name(category: &str) -> String {
    category.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Slice from the first `{` to the last `}`, skipping code fences and chatter.
fn json_body(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
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
