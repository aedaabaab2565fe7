//! Prompt construction for row classification.
//!
//! Builds the system/user message pair sent to the chat engine for one
//! row. The system message carries all the task framing; the user message
//! is the cell value verbatim, so the model sees the data untouched.

use crate::error::{PromptError, PromptResult};
use crate::models::AnalysisMode;

/// System instruction for sentiment mode. The reply must be one of the
/// three literal tokens and nothing else.
const SENTIMENT_SYSTEM: &str = "You are a sentiment analysis assistant. \
Classify the sentiment of the text you are given. \
Respond with exactly one word: Positive, Negative, or Neutral. \
Do not add any explanation or punctuation.";

/// The system/user message pair for one chat completion.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Build the prompt pair for one cell.
///
/// The user message is the cell value verbatim (no trimming). An empty or
/// whitespace-only cell is a row-level failure: the caller maps it to the
/// sentinel label without invoking the engine.
///
/// # Errors
/// [`PromptError::EmptyCell`] when the cell is empty or whitespace-only.
pub fn build_prompt(mode: &AnalysisMode, cell: &str) -> PromptResult<PromptPair> {
    if cell.trim().is_empty() {
        return Err(PromptError::EmptyCell);
    }

    let system = match mode {
        AnalysisMode::Sentiment => SENTIMENT_SYSTEM.to_string(),
        AnalysisMode::Categorize { prompt, categories } => categorize_system(prompt, categories),
    };

    Ok(PromptPair {
        system,
        user: cell.to_string(),
    })
}

/// System instruction for categorize mode.
fn categorize_system(prompt: &str, categories: &[String]) -> String {
    format!(
        "{}. Classify the following text into one of these categories: [{}]. \
Respond with only one of the provided category names and nothing else.",
        prompt,
        categories.join(", ")
    )
}
