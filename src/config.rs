use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_credentials_path")]
    pub credentials_path: String,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_length_percent")]
    pub default_length_percent: u8,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    pub profile_name: Option<String>,

    #[serde(default = "default_save_history")]
    pub save_history: bool,
}

fn data_dir() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("article-whisperer");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir
}

fn default_db_path() -> String {
    data_dir().join("history.db").to_string_lossy().to_string()
}

fn default_credentials_path() -> String {
    data_dir()
        .join("credentials.json")
        .to_string_lossy()
        .to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_length_percent() -> u8 {
    25
}

fn default_request_timeout() -> u64 {
    60
}

fn default_save_history() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            credentials_path: default_credentials_path(),
            api_base_url: default_api_base_url(),
            model: default_model(),
            default_length_percent: default_length_percent(),
            request_timeout_secs: default_request_timeout(),
            profile_name: None,
            save_history: default_save_history(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path`, writing a default config there if none exists yet
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(10..=50).contains(&self.default_length_percent) {
            return Err(AppError::Config(format!(
                "default_length_percent must be between 10 and 50, got {}",
                self.default_length_percent
            )));
        }
        let base = url::Url::parse(self.api_base_url.trim()).map_err(|e| {
            AppError::Config(format!("invalid api_base_url {:?}: {}", self.api_base_url, e))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(AppError::Config(format!(
                "api_base_url must be http(s), got {}",
                base.scheme()
            )));
        }
        if self.model.trim().is_empty() {
            return Err(AppError::Config("model must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("article-whisperer")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.default_length_percent, 25);
        assert!(config.save_history);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "model = \"gemini-1.5-flash\"\nprofile_name = \"Ada\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.model, "gemini-1.5-flash");
        assert_eq!(config.profile_name.as_deref(), Some("Ada"));
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout_secs, 60);
    }

    #[test]
    fn out_of_range_length_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_length_percent = 80\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(AppError::Config(_))));
    }

    #[test]
    fn malformed_base_url_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_base_url = \"not a url\"\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(AppError::Config(_))));

        std::fs::write(&path, "api_base_url = \"ftp://example.com/models\"\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(AppError::Config(_))));
    }
}
