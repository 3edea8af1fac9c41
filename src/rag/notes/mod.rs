//! Structured note extraction.

pub mod extraction;

pub use extraction::{
    ExtractionField, ExtractionSchema, LlmNotesExtractor, NotesExtraction, NotesExtractor,
    NotesFuture, load_categories,
};
