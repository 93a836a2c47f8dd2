use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("API key not set")]
    CredentialMissing,

    #[error("Error from Gemini API: {0}")]
    RemoteError(String),

    #[error("Received unexpected response format from Gemini API")]
    MalformedResponse,

    #[error("Could not parse model output: {0}")]
    ParseFailure(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Could not extract article content: {0}")]
    ContentUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
