//! Google Gemini backend over the public generateContent REST API

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::GeminiConfig;
use crate::error::Result;
use crate::types::{Credential, ModelEndpoint, ProviderKind};

use super::llm::{LlmBackend, ProviderError, ProviderErrorKind};

/// Finish reasons that mean the provider refused to answer
const REJECTED_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

/// Gemini client keyed per call by an API key credential
pub struct GeminiBackend {
    client: Client,
    base_url: String,
    temperature: f32,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

impl GeminiBackend {
    /// Create a new Gemini backend
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
        })
    }

    /// generateContent URL for a model; a leading `models/` is tolerated
    fn endpoint(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

/// Pull the answer text out of a parsed response, or classify why there is none
fn extract_text(response: GenerateResponse) -> std::result::Result<String, ProviderError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ProviderError::new(
            ProviderErrorKind::ContentRejected,
            format!("prompt blocked: {}", reason),
        ));
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(ProviderError::transport("no candidates in Gemini response"));
    };

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if REJECTED_FINISH_REASONS.contains(&reason) {
            return Err(ProviderError::new(
                ProviderErrorKind::ContentRejected,
                format!("response blocked: {}", reason),
            ));
        }
    }

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ProviderError::transport("empty text in Gemini response"));
    }

    Ok(text)
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    async fn call(
        &self,
        prompt: &str,
        model: &ModelEndpoint,
        credential: &Credential,
        max_tokens: Option<u32>,
    ) -> std::result::Result<String, ProviderError> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: max_tokens,
            },
        };

        tracing::debug!(
            "Gemini request: model={}, key={}",
            model.name,
            credential.masked()
        );

        let response = self
            .client
            .post(self.endpoint(&model.name))
            .header("x-goog-api-key", credential.secret())
            .json(&request)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let kind = ProviderErrorKind::from_status(status.as_u16(), &body);
            return Err(ProviderError::new(
                kind,
                format!("Gemini HTTP {}: {}", status, truncate(&body, 300)),
            ));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            ProviderError::transport(format!("Failed to parse Gemini response: {}", e.without_url()))
        })?;

        extract_text(parsed)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GenerateResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_endpoint_strips_models_prefix() {
        let backend = GeminiBackend::new(&GeminiConfig::default()).unwrap();
        let a = backend.endpoint("models/gemini-2.5-flash");
        let b = backend.endpoint("gemini-2.5-flash");
        assert_eq!(a, b);
        assert!(a.ends_with("/v1beta/models/gemini-2.5-flash:generateContent"));
    }

    #[tokio::test]
    async fn test_unreachable_host_error_hides_key() {
        let backend = GeminiBackend::new(&GeminiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 5,
            ..GeminiConfig::default()
        })
        .unwrap();
        let model = ModelEndpoint::ranked(ProviderKind::Gemini, &["gemini-2.5-flash".to_string()])
            .remove(0);
        let key = Credential::new("GEMINI_API_KEY", ProviderKind::Gemini, "AIzaSyTOPSECRET0123456789");

        let err = backend.call("hello", &model, &key, None).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Transport);
        assert!(!err.message.contains("TOPSECRET"), "secret leaked: {}", err.message);
        assert!(!err.to_string().contains("key="));
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"world"}]},"finishReason":"STOP"}]}"#,
        );
        assert_eq!(extract_text(response).unwrap(), "Hello world");
    }

    #[test]
    fn test_blocked_prompt_is_content_rejected() {
        let response = parse(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#);
        let err = extract_text(response).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::ContentRejected);
    }

    #[test]
    fn test_safety_finish_is_content_rejected() {
        let response = parse(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#);
        let err = extract_text(response).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::ContentRejected);
    }

    #[test]
    fn test_empty_candidates_is_transport() {
        let response = parse(r#"{"candidates":[]}"#);
        let err = extract_text(response).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Transport);
    }
}
