use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationParams,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateRequest {
    pub fn new(prompt: String, params: GenerationParams) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part { text: Some(prompt) }],
            }],
            generation_config: params,
        }
    }

    pub fn prompt(&self) -> &str {
        self.contents
            .first()
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.as_deref())
            .unwrap_or_default()
    }

    pub fn params(&self) -> &GenerationParams {
        &self.generation_config
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<Part>>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Pull the first candidate's text out of a success envelope.
pub fn extract_candidate_text(body: &str) -> Result<String> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|_| AppError::MalformedResponse)?;

    response
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .and_then(|c| c.parts)
        .and_then(|p| p.into_iter().next())
        .and_then(|p| p.text)
        .filter(|t| !t.trim().is_empty())
        .ok_or(AppError::MalformedResponse)
}

/// Message for a non-2xx response: the API's own message when the body has
/// one, otherwise the HTTP status text.
pub fn remote_error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error)
        .and_then(|e| e.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string())
        })
}

/// Transport to a `generateContent`-style endpoint.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Send one request and return the first candidate's raw text.
    async fn generate(&self, api_key: &str, request: &GenerateRequest) -> Result<String>;

    fn model(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl From<&Config> for GatewayConfig {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    fn endpoint(&self, api_key: &str) -> String {
        format!(
            "{}/{}:generateContent?key={}",
            self.base_url,
            self.model,
            urlencoding::encode(api_key)
        )
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate(&self, api_key: &str, request: &GenerateRequest) -> Result<String> {
        tracing::debug!(
            model = %self.model,
            prompt_chars = request.prompt().len(),
            temperature = request.params().temperature,
            "Calling generateContent"
        );

        let response = self
            .client
            .post(self.endpoint(api_key))
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = remote_error_message(status, &body);
            tracing::warn!("Gemini API error ({}): {}", status, message);
            return Err(AppError::RemoteError(message));
        }

        extract_candidate_text(&body).inspect_err(|_| {
            tracing::warn!("Unexpected response format ({} bytes)", body.len());
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: GenerationParams = GenerationParams {
        temperature: 0.2,
        top_k: 40,
        top_p: 0.95,
        max_output_tokens: 1024,
    };

    #[test]
    fn request_body_matches_wire_format() {
        let request = GenerateRequest::new("Hello".to_string(), PARAMS);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["contents"][0]["parts"][0]["text"], "Hello");
        assert_eq!(json["generationConfig"]["topK"], 40);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1024);
        assert!(json["generationConfig"]["topP"].as_f64().unwrap() > 0.9);
    }

    #[test]
    fn first_candidate_text_is_extracted() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"First"},{"text":"Second"}]}},
                       {"content":{"parts":[{"text":"Other"}]}}]}"#;
        assert_eq!(extract_candidate_text(body).unwrap(), "First");
    }

    #[test]
    fn missing_fields_are_malformed() {
        for body in [
            "not json",
            "{}",
            r#"{"candidates":[]}"#,
            r#"{"candidates":[{"content":{"parts":[]}}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"text":"   "}]}}]}"#,
        ] {
            assert!(
                matches!(extract_candidate_text(body), Err(AppError::MalformedResponse)),
                "{body}"
            );
        }
    }

    #[test]
    fn remote_message_prefers_api_error() {
        let body = r#"{"error":{"code":400,"message":"API key not valid"}}"#;
        assert_eq!(
            remote_error_message(StatusCode::BAD_REQUEST, body),
            "API key not valid"
        );
        assert_eq!(
            remote_error_message(StatusCode::SERVICE_UNAVAILABLE, "<html>"),
            "Service Unavailable"
        );
    }

    #[test]
    fn endpoint_embeds_model_and_encoded_key() {
        let client = GeminiClient::new(&GatewayConfig {
            base_url: "https://example.test/v1beta/models/".to_string(),
            model: "gemini-1.5-pro".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        assert_eq!(
            client.endpoint("key with space"),
            "https://example.test/v1beta/models/gemini-1.5-pro:generateContent?key=key%20with%20space"
        );
    }
}
