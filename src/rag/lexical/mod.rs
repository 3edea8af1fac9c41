//! Keyword scoring over the fitted corpus.

pub mod scorer;
pub mod tokenizer;

pub use scorer::{LexicalHit, LexicalScorer};
pub use tokenizer::tokenize;
