//! LLM backend trait and the closed provider failure taxonomy

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use crate::types::{Credential, ModelEndpoint, ProviderKind};

/// What went wrong on a single (model, credential) call.
///
/// The gateway branches on this value to decide whether to rotate the
/// credential, skip the model, or give up on the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorKind {
    /// 429 / quota exhausted for this key
    QuotaOrRateLimited,
    /// Key rejected by the provider
    InvalidCredential,
    /// Model does not exist or is not served right now
    ModelUnavailable,
    /// Provider refused the prompt or the output (safety block)
    ContentRejected,
    /// Network failure or unexpected response
    Transport,
}

impl ProviderErrorKind {
    /// Whether another credential for the same model may succeed
    pub fn rotates_credential(&self) -> bool {
        matches!(
            self,
            ProviderErrorKind::QuotaOrRateLimited | ProviderErrorKind::InvalidCredential
        )
    }

    /// Whether the failure ends the call without trying anything else
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProviderErrorKind::ContentRejected | ProviderErrorKind::Transport
        )
    }

    /// Classify an HTTP status plus response body.
    ///
    /// Shared by the HTTP backends; provider-specific refinements happen
    /// before falling back to this.
    pub fn from_status(status: u16, body: &str) -> Self {
        let lower = body.to_lowercase();
        match status {
            429 => ProviderErrorKind::QuotaOrRateLimited,
            401 | 403 => ProviderErrorKind::InvalidCredential,
            404 => ProviderErrorKind::ModelUnavailable,
            503 => ProviderErrorKind::ModelUnavailable,
            400 if lower.contains("api key not valid") || lower.contains("api_key_invalid") => {
                ProviderErrorKind::InvalidCredential
            }
            400 if lower.contains("resource_exhausted") || lower.contains("quota") => {
                ProviderErrorKind::QuotaOrRateLimited
            }
            _ if lower.contains("resource_exhausted") => ProviderErrorKind::QuotaOrRateLimited,
            _ => ProviderErrorKind::Transport,
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderErrorKind::QuotaOrRateLimited => "quota_or_rate_limited",
            ProviderErrorKind::InvalidCredential => "invalid_credential",
            ProviderErrorKind::ModelUnavailable => "model_unavailable",
            ProviderErrorKind::ContentRejected => "content_rejected",
            ProviderErrorKind::Transport => "transport_error",
        };
        f.write_str(name)
    }
}

/// Failure of one provider call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Transport, message)
    }

    /// Classify a reqwest send/read failure. The request URL is dropped
    /// from the message since it may carry credentials.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let err = err.without_url();
        match err.status() {
            Some(status) => Self::new(
                ProviderErrorKind::from_status(status.as_u16(), ""),
                err.to_string(),
            ),
            None => Self::transport(err.to_string()),
        }
    }

    /// Replace every occurrence of `secret` in the message
    pub fn redact(mut self, secret: &str) -> Self {
        if !secret.is_empty() && self.message.contains(secret) {
            self.message = self.message.replace(secret, "***");
        }
        self
    }
}

/// A text-generation provider reachable with an explicit model and credential.
///
/// Implementations:
/// - `GeminiBackend`: Google Gemini REST API (API keys)
/// - `OllamaBackend`: local Ollama server (credential ignored)
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate text for `prompt` with exactly this model and credential
    async fn call(
        &self,
        prompt: &str,
        model: &ModelEndpoint,
        credential: &Credential,
        max_tokens: Option<u32>,
    ) -> std::result::Result<String, ProviderError>;

    /// Provider family served by this backend
    fn kind(&self) -> ProviderKind;

    /// Get provider name for logging
    fn name(&self) -> &str {
        self.kind().as_str()
    }
}
