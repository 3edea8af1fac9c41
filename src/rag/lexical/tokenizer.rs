//! Word tokenizer for the lexical scorer.
//!
//! Lowercases the input, keeps runs of two or more word characters and drops
//! common English stop words, so glue words never count as keyword overlap.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::rag::core::errors::RagResult;

static TOKEN_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b"));

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
        "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
        "they", "this", "to", "was", "will", "with",
    ]
    .into_iter()
    .collect()
});

/// Split text into lowercase terms.
///
/// # Errors
/// Returns an error only if the token pattern failed to compile.
pub fn tokenize(text: &str) -> RagResult<Vec<String>> {
    let pattern = TOKEN_RE.as_ref().map_err(Clone::clone)?;
    let lowered = text.to_lowercase();
    Ok(pattern
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|token| !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_drops_single_chars() {
        let tokens = tokenize("A Claim-Form, and ID proof!").unwrap_or_default();
        assert_eq!(tokens, vec!["claim", "form", "id", "proof"]);
    }

    #[test]
    fn test_keeps_digits_drops_stop_words() {
        let tokens = tokenize("office hours are 9 to 5, room 12").unwrap_or_default();
        assert_eq!(tokens, vec!["office", "hours", "room", "12"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("  ?! ").unwrap_or_default().is_empty());
    }
}
