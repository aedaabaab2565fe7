//! Cleanup of raw model completions into usable labels.
//!
//! Reasoning models wrap their chain of thought in `<think>...</think>`
//! before the actual answer. The label is whatever follows the last
//! closing marker.

/// Marker pair emitted by reasoning models around their chain of thought.
const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Turn a raw completion into a label.
///
/// Trims whitespace; if the text contains `<think>` with a matching
/// `</think>` after it, everything through the last closing marker is
/// dropped and the remainder trimmed. The label is not validated against
/// any category list. Idempotent: cleaning a cleaned label is a no-op.
///
/// # Example
/// ```ignore
/// assert_eq!(clean_label("<think>the tone is upbeat</think>\nPositive"), "Positive");
/// assert_eq!(clean_label("  Negative  "), "Negative");
/// ```
pub fn clean_label(raw: &str) -> String {
    let text = raw.trim();

    if let Some(open) = text.find(THINK_OPEN) {
        if let Some(close) = text[open..].rfind(THINK_CLOSE) {
            let after = open + close + THINK_CLOSE.len();
            return text[after..].trim().to_string();
        }
    }

    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_label_trimmed() {
        assert_eq!(clean_label("  Positive \n"), "Positive");
        assert_eq!(clean_label("Neutral"), "Neutral");
    }

    #[test]
    fn test_strips_reasoning_block() {
        let raw = "<think>The reviewer sounds happy about the product.</think>\nPositive";
        assert_eq!(clean_label(raw), "Positive");
    }

    #[test]
    fn test_strips_through_last_close() {
        let raw = "<think>first</think><think>second</think>Negative";
        assert_eq!(clean_label(raw), "Negative");
    }

    #[test]
    fn test_text_before_marker_is_dropped() {
        let raw = "draft<think>reconsider</think>Neutral";
        assert_eq!(clean_label(raw), "Neutral");
    }

    #[test]
    fn test_unclosed_marker_left_alone() {
        let raw = "<think>never closed Positive";
        assert_eq!(clean_label(raw), raw);
    }

    #[test]
    fn test_idempotent() {
        let once = clean_label("<think>hmm</think>  billing  ");
        let twice = clean_label(&once);
        assert_eq!(once, "billing");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(clean_label(""), "");
        assert_eq!(clean_label("<think>only reasoning</think>"), "");
    }
}
