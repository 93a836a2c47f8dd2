//! Lenient parsing of free-form model output.
//!
//! The model is asked for a fixed format but nothing guarantees it; every
//! parser here either recovers a typed value or reports why it could not.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{
    AuthenticityAssessment, QuizQuestion, Reference, ReferenceKind, MAX_QUIZ_QUESTIONS,
    NO_EXPLANATION,
};

fn score_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bscore\b\W{0,3}?[:=]\s*\**\s*(\d+)").expect("score pattern is valid")
    })
}

fn explanation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)\bexplanation\b\W{0,3}?[:=]\s*\**\s*(.+)")
            .expect("explanation pattern is valid")
    })
}

/// Missing pieces fall back to a zero score and a placeholder explanation.
pub fn parse_authenticity(text: &str) -> AuthenticityAssessment {
    let score = score_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .map(|s| s.min(100) as u8)
        .unwrap_or(0);

    let explanation = explanation_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| NO_EXPLANATION.to_string());

    AuthenticityAssessment { score, explanation }
}

/// Find the balanced `[...]` starting at byte offset `start`, skipping
/// brackets that appear inside JSON string literals.
fn balanced_array(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn object_array(candidate: &str) -> std::result::Result<Vec<Value>, String> {
    let values = serde_json::from_str::<Vec<Value>>(candidate).map_err(|e| e.to_string())?;
    if values.iter().all(Value::is_object) {
        Ok(values)
    } else {
        Err("JSON array does not contain objects".to_string())
    }
}

/// Parse an array of JSON objects out of model output: first the whole
/// text, then the first bracket-delimited array of objects.
pub fn parse_json_array(text: &str) -> std::result::Result<Vec<Value>, String> {
    let trimmed = text.trim();
    if let Ok(values) = object_array(trimmed) {
        return Ok(values);
    }

    let mut last_error = None;
    for (start, _) in trimmed.match_indices('[') {
        let Some(candidate) = balanced_array(trimmed, start) else {
            continue;
        };
        match object_array(candidate) {
            Ok(values) => return Ok(values),
            Err(e) => last_error = Some(e),
        }
    }

    Err(last_error.unwrap_or_else(|| "no JSON array found in model output".to_string()))
}

fn string_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn reference_from_value(value: &Value) -> Option<Reference> {
    let url = string_field(value, &["url", "link"])?;
    let title = string_field(value, &["title", "name"]).unwrap_or(url);
    let kind = string_field(value, &["type", "kind"])
        .and_then(ReferenceKind::parse)
        .unwrap_or_else(|| ReferenceKind::from_url(url));

    Some(Reference {
        title: title.to_string(),
        url: url.to_string(),
        kind,
    })
}

/// Entries without a url are dropped; a missing or unknown `type` is
/// inferred from the url.
pub fn parse_references(text: &str) -> std::result::Result<Vec<Reference>, String> {
    let values = parse_json_array(text)?;
    Ok(values.iter().filter_map(reference_from_value).collect())
}

fn answer_index(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn question_from_value(value: &Value) -> Option<QuizQuestion> {
    let question = string_field(value, &["question", "questionText"])?;
    let options = value
        .get("options")?
        .as_array()?
        .iter()
        .map(|o| o.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()?;
    let answer = ["answer", "correctOptionIndex", "correct"]
        .iter()
        .find_map(|k| value.get(*k))
        .and_then(answer_index)?;

    QuizQuestion::new(question, options, answer)
}

/// Keeps at most five well-formed questions. No usable question at all is
/// an error.
pub fn parse_quiz_questions(text: &str) -> Result<Vec<QuizQuestion>> {
    let values = parse_json_array(text).map_err(AppError::ParseFailure)?;

    let total = values.len();
    let questions: Vec<QuizQuestion> = values
        .iter()
        .filter_map(question_from_value)
        .take(MAX_QUIZ_QUESTIONS)
        .collect();

    if questions.is_empty() {
        return Err(AppError::ParseFailure(format!(
            "none of the {} generated quiz questions were usable",
            total
        )));
    }
    if questions.len() < total.min(MAX_QUIZ_QUESTIONS) {
        tracing::warn!(
            "Dropped malformed quiz questions ({} usable of {})",
            questions.len(),
            total
        );
    }
    Ok(questions)
}
