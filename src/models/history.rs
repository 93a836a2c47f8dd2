use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const TITLE_MAX_CHARS: usize = 80;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleHistoryRecord {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub original_text: String,
    pub summary: String,
    pub created_at: DateTime<Utc>,
    pub quiz: Option<QuizResultRecord>,
}

#[derive(Debug, Clone)]
pub struct NewArticleHistory {
    pub user_id: i64,
    pub title: String,
    pub original_text: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResultRecord {
    pub id: i64,
    pub article_history_id: i64,
    pub user_id: i64,
    pub score: u8,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileStats {
    pub articles: usize,
    pub quizzes: usize,
    pub average_score: Option<f64>,
}

impl ProfileStats {
    pub fn from_history(history: &[ArticleHistoryRecord]) -> Self {
        let scores: Vec<u8> = history
            .iter()
            .filter_map(|h| h.quiz.as_ref().map(|q| q.score))
            .collect();
        let average_score = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().map(|&s| f64::from(s)).sum::<f64>() / scores.len() as f64)
        };
        Self {
            articles: history.len(),
            quizzes: scores.len(),
            average_score,
        }
    }
}

/// Title for a history entry: the page title when known, otherwise the
/// first non-empty line of the article, shortened.
pub fn derive_title(page_title: Option<&str>, text: &str) -> String {
    let candidate = page_title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or_else(|| text.lines().map(str::trim).find(|l| !l.is_empty()))
        .unwrap_or("Untitled article");

    if candidate.chars().count() <= TITLE_MAX_CHARS {
        candidate.to_string()
    } else {
        let cut: String = candidate.chars().take(TITLE_MAX_CHARS - 3).collect();
        format!("{}...", cut.trim_end())
    }
}
