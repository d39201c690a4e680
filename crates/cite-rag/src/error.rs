//! Error types for the query engine

use thiserror::Error;

use crate::providers::llm::ProviderError;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Engine errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Vector store query error
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// Page-range fetch error
    #[error("Page fetch error: {0}")]
    PageFetch(String),

    /// Non-recoverable provider failure (content rejected, transport)
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Prompt estimate exceeds the configured ceiling
    #[error("Prompt too large: ~{estimated} tokens exceeds limit of {limit}")]
    PromptTooLarge { estimated: usize, limit: usize },

    /// Every (model, credential) pair of a provider failed
    #[error("Provider '{provider}' exhausted after {attempts} attempt(s)")]
    ProviderExhausted { provider: String, attempts: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a vector store error
    pub fn vector_store(message: impl Into<String>) -> Self {
        Self::VectorStore(message.into())
    }

    /// Create a page fetch error
    pub fn page_fetch(message: impl Into<String>) -> Self {
        Self::PageFetch(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
