use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

pub const MIN_LENGTH_PERCENT: u8 = 10;
pub const MAX_LENGTH_PERCENT: u8 = 50;
pub const LENGTH_PERCENT_STEP: u8 = 5;
pub const MIN_TARGET_WORDS: usize = 50;

/// Articles shorter than this are not worth summarizing
pub const MIN_ARTICLE_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub source_text: String,
    pub target_length_percent: u8,
}

impl SummaryRequest {
    pub fn new(source_text: impl Into<String>, target_length_percent: u8) -> Result<Self> {
        if !(MIN_LENGTH_PERCENT..=MAX_LENGTH_PERCENT).contains(&target_length_percent) {
            return Err(AppError::InvalidInput(format!(
                "summary length must be between {}% and {}%",
                MIN_LENGTH_PERCENT, MAX_LENGTH_PERCENT
            )));
        }
        Ok(Self {
            source_text: source_text.into(),
            target_length_percent,
        })
    }

    pub fn target_words(&self) -> usize {
        target_word_count(word_count(&self.source_text), self.target_length_percent)
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn target_word_count(word_count: usize, length_percent: u8) -> usize {
    let scaled = (word_count as f64 * f64::from(length_percent) / 100.0).round() as usize;
    scaled.max(MIN_TARGET_WORDS)
}

/// Reject article text the UI would not submit.
pub fn validate_article_text(text: &str) -> Result<&str> {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_ARTICLE_CHARS {
        return Err(AppError::InvalidInput(format!(
            "Please enter a longer article (minimum {} characters)",
            MIN_ARTICLE_CHARS
        )));
    }
    Ok(trimmed)
}

/// Move the length slider one step, clamped to the allowed range.
pub fn step_length_percent(current: u8, up: bool) -> u8 {
    let next = if up {
        current.saturating_add(LENGTH_PERCENT_STEP)
    } else {
        current.saturating_sub(LENGTH_PERCENT_STEP)
    };
    next.clamp(MIN_LENGTH_PERCENT, MAX_LENGTH_PERCENT)
}
