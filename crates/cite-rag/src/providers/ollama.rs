//! Ollama local runtime: text generation backend and embedder

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::OllamaConfig;
use crate::error::{Error, Result};
use crate::types::{Credential, ModelEndpoint, ProviderKind};

use super::embedding::Embedder;
use super::llm::{LlmBackend, ProviderError, ProviderErrorKind};

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    prompt: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

fn http_client(timeout_secs: u64) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .pool_max_idle_per_host(5)
        .build()?)
}

/// Classify a non-success Ollama response
fn classify(status: u16, body: &str) -> ProviderErrorKind {
    let lower = body.to_lowercase();
    if status == 404 || (lower.contains("model") && lower.contains("not found")) {
        ProviderErrorKind::ModelUnavailable
    } else {
        ProviderErrorKind::Transport
    }
}

/// Generation backend for a local Ollama server.
///
/// Ollama takes no credentials; the gateway pairs it with
/// [`Credential::local`].
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    temperature: f32,
}

impl OllamaBackend {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn call(
        &self,
        prompt: &str,
        model: &ModelEndpoint,
        _credential: &Credential,
        max_tokens: Option<u32>,
    ) -> std::result::Result<String, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &model.name,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: max_tokens,
            },
        };

        tracing::info!("Generating with local model: {}", model.name);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(
                classify(status.as_u16(), &body),
                format!("Ollama HTTP {}: {}", status, body),
            ));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            ProviderError::transport(format!("Failed to parse generation response: {}", e.without_url()))
        })?;

        Ok(parsed.response)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }
}

/// Query embedder backed by Ollama's `/api/embeddings`, with retry
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.embed_model.clone(),
            max_retries: config.max_retries,
        })
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        let delay = Duration::from_secs(2u64.pow(attempt));
                        tracing::warn!(
                            "Embedding request failed (attempt {}/{}), retrying in {:?}",
                            attempt + 1,
                            self.max_retries + 1,
                            delay
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::embedding("Unknown error")))
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);

        self.retry_request(|| {
            let request = EmbedRequest {
                model: self.model.clone(),
                prompt: text.to_string(),
            };
            let client = self.client.clone();
            let url = url.clone();

            async move {
                let response = client
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| Error::embedding(format!("Embedding request failed: {}", e.without_url())))?;

                if !response.status().is_success() {
                    return Err(Error::embedding(format!(
                        "Embedding failed: HTTP {}",
                        response.status()
                    )));
                }

                let parsed: EmbedResponse = response.json().await.map_err(|e| {
                    Error::embedding(format!("Failed to parse embedding response: {}", e.without_url()))
                })?;

                if parsed.embedding.is_empty() {
                    return Err(Error::embedding("Empty embedding returned"));
                }

                Ok(parsed.embedding)
            }
        })
        .await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
