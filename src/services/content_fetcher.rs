use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::MIN_ARTICLE_CHARS;

const USER_AGENT_STRING: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

#[derive(Debug, Clone)]
pub struct FetchedArticle {
    pub url: String,
    pub title: Option<String>,
    pub text: String,
}

pub struct ContentFetcher {
    client: Client,
}

impl ContentFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Download a page and reduce it to readable text
    pub async fn fetch_article(&self, article_url: &str) -> Result<FetchedArticle> {
        let url = Url::parse(article_url.trim())
            .map_err(|e| AppError::InvalidInput(format!("invalid URL: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::InvalidInput(format!(
                "unsupported URL scheme: {}",
                url.scheme()
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
        headers.insert(ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml"));

        let response = self
            .client
            .get(url.as_str())
            .headers(headers)
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::debug!("Failed to fetch {}: {}", url, response.status());
            return Err(AppError::ContentUnavailable(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        let html = response.text().await?;
        let title = extract_title(&html);
        let text = extract_content(&html).ok_or_else(|| {
            AppError::ContentUnavailable(format!("no readable article text at {}", url))
        })?;

        Ok(FetchedArticle {
            url: url.to_string(),
            title,
            text,
        })
    }
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title pattern is valid"))
}

fn extract_title(html: &str) -> Option<String> {
    let raw = title_re().captures(html)?.get(1)?.as_str();
    let decoded = html2text::from_read(raw.as_bytes(), 1000).ok()?;
    let title = decoded.split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}

/// Extract readable content from HTML using html2text
fn extract_content(html: &str) -> Option<String> {
    let text = match html2text::from_read(html.as_bytes(), 100) {
        Ok(t) => t,
        Err(e) => {
            tracing::debug!("Failed to convert HTML to text: {}", e);
            return None;
        }
    };

    // Clean up the text - remove excessive whitespace
    let cleaned: String = text
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if cleaned.chars().count() >= MIN_ARTICLE_CHARS {
        Some(cleaned)
    } else {
        tracing::debug!("Extracted content too short ({} chars)", cleaned.len());
        None
    }
}
