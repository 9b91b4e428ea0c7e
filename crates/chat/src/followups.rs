//! Follow-up question extraction.
//!
//! Models asked to suggest next questions embed them in the answer as
//! `<<question>>` spans. This module splits them out of the visible content.

use once_cell::sync::Lazy;
use regex::Regex;

/// Marker opening a follow-up question span.
pub const FOLLOWUP_OPEN_MARKER: &str = "<<";

static FOLLOWUP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<<([^>]+)>>").expect("follow-up marker pattern is valid"));

/// Split answer content into visible text and the ordered follow-up list.
///
/// Visible text is everything before the first `<<`; the questions are every
/// `<<...>>`-delimited span in order of appearance.
pub fn extract_followup_questions(content: &str) -> (String, Vec<String>) {
    let visible = content
        .split(FOLLOWUP_OPEN_MARKER)
        .next()
        .unwrap_or("")
        .to_string();

    let questions = FOLLOWUP_RE
        .captures_iter(content)
        .map(|captures| captures[1].to_string())
        .collect();

    (visible, questions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_two_questions() {
        let (visible, questions) = extract_followup_questions("The answer. <<Q1?>><<Q2?>>");
        assert_eq!(visible, "The answer. ");
        assert_eq!(questions, vec!["Q1?", "Q2?"]);
    }

    #[test]
    fn test_extract_without_markers() {
        let (visible, questions) = extract_followup_questions("Just an answer.");
        assert_eq!(visible, "Just an answer.");
        assert!(questions.is_empty());
    }

    #[test]
    fn test_extract_is_idempotent_on_clean_text() {
        let (visible, questions) = extract_followup_questions("Answer <<Q1?>> trailing");
        assert_eq!(questions, vec!["Q1?"]);

        // A second pass over already-clean text extracts nothing further.
        let (again, none) = extract_followup_questions(&visible);
        assert_eq!(again, visible);
        assert!(none.is_empty());
    }

    #[test]
    fn test_unclosed_marker_yields_no_question() {
        let (visible, questions) = extract_followup_questions("Answer <<dangling");
        assert_eq!(visible, "Answer ");
        assert!(questions.is_empty());
    }

    #[test]
    fn test_questions_in_order_of_appearance() {
        let (_, questions) =
            extract_followup_questions("<<first?>> middle <<second?>> end <<third?>>");
        assert_eq!(questions, vec!["first?", "second?", "third?"]);
    }
}
