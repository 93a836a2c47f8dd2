use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{ArticleHistoryRecord, NewArticleHistory, Profile, QuizResultRecord};

use super::schema::SCHEMA;

const HISTORY_SELECT: &str = r#"SELECT h.id, h.user_id, h.title, h.original_text, h.summary, h.created_at,
                                      q.id, q.user_id, q.score, q.suggestion
                               FROM article_history h
                               LEFT JOIN quiz_results q ON q.id = (
                                   SELECT id FROM quiz_results
                                   WHERE article_history_id = h.id
                                   ORDER BY id DESC LIMIT 1
                               )"#;

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Profile operations

    /// The local profile, created on first use. A given name overwrites the
    /// stored one.
    pub async fn ensure_profile(&self, full_name: Option<String>) -> Result<Profile> {
        let profile = self
            .conn
            .call(move |conn| {
                let existing: Option<i64> = conn
                    .query_row("SELECT id FROM profiles ORDER BY id LIMIT 1", [], |row| {
                        row.get(0)
                    })
                    .optional()?;

                let id = match existing {
                    Some(id) => {
                        if full_name.is_some() {
                            conn.execute(
                                "UPDATE profiles SET full_name = ?1 WHERE id = ?2",
                                params![full_name, id],
                            )?;
                        }
                        id
                    }
                    None => {
                        conn.execute(
                            "INSERT INTO profiles (full_name) VALUES (?1)",
                            params![full_name],
                        )?;
                        conn.last_insert_rowid()
                    }
                };

                let profile = conn.query_row(
                    "SELECT id, full_name, created_at FROM profiles WHERE id = ?1",
                    params![id],
                    profile_from_row,
                )?;
                Ok(profile)
            })
            .await?;
        Ok(profile)
    }

    #[cfg(test)]
    pub async fn get_profile(&self, id: i64) -> Result<Option<Profile>> {
        let profile = self
            .conn
            .call(move |conn| {
                let profile = conn
                    .query_row(
                        "SELECT id, full_name, created_at FROM profiles WHERE id = ?1",
                        params![id],
                        profile_from_row,
                    )
                    .optional()?;
                Ok(profile)
            })
            .await?;
        Ok(profile)
    }

    // Article history operations

    pub async fn save_article(&self, article: NewArticleHistory) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO article_history (user_id, title, original_text, summary) VALUES (?1, ?2, ?3, ?4)",
                    params![article.user_id, article.title, article.original_text, article.summary],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    /// Newest first, each with its latest quiz result if any
    pub async fn get_history(&self, user_id: i64) -> Result<Vec<ArticleHistoryRecord>> {
        let history = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "{HISTORY_SELECT} WHERE h.user_id = ?1 ORDER BY h.created_at DESC, h.id DESC"
                );
                let mut stmt = conn.prepare(&sql)?;
                let history = stmt
                    .query_map(params![user_id], history_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(history)
            })
            .await?;
        Ok(history)
    }

    #[cfg(test)]
    pub async fn get_article(&self, id: i64) -> Result<Option<ArticleHistoryRecord>> {
        let article = self
            .conn
            .call(move |conn| {
                let sql = format!("{HISTORY_SELECT} WHERE h.id = ?1");
                let article = conn
                    .query_row(&sql, params![id], history_from_row)
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    pub async fn delete_article(&self, id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                // Delete related data first
                conn.execute(
                    "DELETE FROM quiz_results WHERE article_history_id = ?1",
                    params![id],
                )?;
                conn.execute("DELETE FROM article_history WHERE id = ?1", params![id])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Quiz result operations

    pub async fn save_quiz_result(
        &self,
        article_history_id: i64,
        user_id: i64,
        score: u8,
        suggestion: Option<String>,
    ) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO quiz_results (article_history_id, user_id, score, suggestion) VALUES (?1, ?2, ?3, ?4)",
                    params![article_history_id, user_id, score, suggestion],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn timestamp(row: &Row, idx: usize) -> DateTime<Utc> {
    row.get::<_, String>(idx)
        .ok()
        .and_then(|s| parse_datetime(&s))
        .unwrap_or_else(Utc::now)
}

fn profile_from_row(row: &Row) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        full_name: row.get(1)?,
        created_at: timestamp(row, 2),
    })
}

fn history_from_row(row: &Row) -> rusqlite::Result<ArticleHistoryRecord> {
    let id: i64 = row.get(0)?;
    let quiz_id: Option<i64> = row.get(6)?;
    let quiz = match quiz_id {
        Some(quiz_id) => Some(QuizResultRecord {
            id: quiz_id,
            article_history_id: id,
            user_id: row.get(7)?,
            score: u8::try_from(row.get::<_, i64>(8)?).unwrap_or(0),
            suggestion: row.get(9)?,
        }),
        None => None,
    };

    Ok(ArticleHistoryRecord {
        id,
        user_id: row.get(1)?,
        title: row.get(2)?,
        original_text: row.get(3)?,
        summary: row.get(4)?,
        created_at: timestamp(row, 5),
        quiz,
    })
}
