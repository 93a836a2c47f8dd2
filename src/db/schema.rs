pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- profiles table
CREATE TABLE IF NOT EXISTS profiles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    full_name TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- article_history table
CREATE TABLE IF NOT EXISTS article_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    original_text TEXT NOT NULL,
    summary TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_article_history_user ON article_history(user_id, created_at DESC);

-- quiz_results table
CREATE TABLE IF NOT EXISTS quiz_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    article_history_id INTEGER NOT NULL REFERENCES article_history(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    score INTEGER NOT NULL CHECK (score BETWEEN 0 AND 100),
    suggestion TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_quiz_results_article ON quiz_results(article_history_id);
"#;
