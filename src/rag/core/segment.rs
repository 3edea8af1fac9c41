//! Corpus segment and query models.

use serde::{Deserialize, Serialize};

use crate::rag::core::errors::{RagError, RagResult};
use crate::rag::core::ids::SegmentId;

/// Location of a segment inside its source document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentPosition {
    /// 1-based page number, when the source is paginated.
    #[serde(default)]
    pub page: Option<u32>,
    /// Chunk offset within the page or document.
    #[serde(default)]
    pub offset: Option<u32>,
}

/// Immutable unit of retrievable text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Unique id within the corpus.
    pub segment_id: SegmentId,
    /// Document the segment was cut from.
    pub source_document_id: String,
    /// Page / offset of the segment.
    #[serde(default)]
    pub position: SegmentPosition,
    /// Segment text.
    pub text: String,
}

impl Segment {
    /// Create a segment, rejecting blank text.
    ///
    /// # Errors
    /// Returns an error if the text is empty after trimming.
    pub fn new(
        segment_id: impl Into<SegmentId>,
        source_document_id: impl Into<String>,
        position: SegmentPosition,
        text: impl Into<String>,
    ) -> RagResult<Self> {
        let segment = Self {
            segment_id: segment_id.into(),
            source_document_id: source_document_id.into(),
            position,
            text: text.into(),
        };
        segment.validate()?;
        Ok(segment)
    }

    /// Validate segment invariants.
    ///
    /// # Errors
    /// Returns an error if the id or text is blank.
    pub fn validate(&self) -> RagResult<()> {
        if self.segment_id.as_str().trim().is_empty() {
            return Err(RagError::InvalidSegment("segment_id is empty".to_string()));
        }
        if self.text.trim().is_empty() {
            return Err(RagError::InvalidSegment(format!(
                "segment {} has no text",
                self.segment_id
            )));
        }
        Ok(())
    }
}

/// A single user query.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    /// Natural-language query text.
    pub text: String,
    /// Optional query embedding for vector search.
    pub embedding: Option<Vec<f32>>,
}

impl Query {
    /// Create a text-only query.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            embedding: None,
        }
    }

    /// Attach an embedding.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_rejects_blank_text() {
        let result = Segment::new("a", "doc.pdf", SegmentPosition::default(), "   ");
        assert!(matches!(result, Err(RagError::InvalidSegment(_))));
    }

    #[test]
    fn test_segment_deserializes_without_position() {
        let json = r#"{"segment_id":"s1","source_document_id":"doc.pdf","text":"hello"}"#;
        let segment: Option<Segment> = serde_json::from_str(json).ok();
        let segment = segment.unwrap_or_else(|| unreachable!("valid segment json"));
        assert_eq!(segment.position, SegmentPosition::default());
        assert_eq!(segment.segment_id.as_str(), "s1");
    }

    #[test]
    fn test_query_with_embedding() {
        let query = Query::new("claim documents").with_embedding(vec![0.1, 0.2]);
        assert_eq!(query.embedding.as_deref(), Some(&[0.1_f32, 0.2][..]));
    }
}
