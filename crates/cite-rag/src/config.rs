//! Configuration for the query engine

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::ProviderKind;

/// Main engine configuration. Every section is optional in TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub milvus: MilvusConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub decomposition: DecompositionConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub suggestions: SuggestionConfig,
}

impl RagConfig {
    /// Load and validate a TOML config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RagConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        self.gateway.primary.validate("gateway.primary")?;
        if let Some(fallback) = &self.gateway.fallback {
            fallback.validate("gateway.fallback")?;
        }
        if self.gateway.max_prompt_tokens == 0 {
            return Err(Error::config("gateway.max_prompt_tokens must be > 0"));
        }
        if self.gateway.sticky_reset_secs == Some(0) {
            return Err(Error::config("gateway.sticky_reset_secs must be > 0 when set"));
        }

        if self.retrieval.top_k == 0 {
            return Err(Error::config("retrieval.top_k must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.retrieval.similarity_threshold) {
            return Err(Error::config(
                "retrieval.similarity_threshold must be in [0.0, 1.0]",
            ));
        }
        if self.retrieval.max_concurrent_collections == 0 {
            return Err(Error::config("retrieval.max_concurrent_collections must be > 0"));
        }
        if self.retrieval.collection_timeout_secs == 0 {
            return Err(Error::config("retrieval.collection_timeout_secs must be > 0"));
        }

        if self.context.fetch_timeout_secs == 0 {
            return Err(Error::config("context.fetch_timeout_secs must be > 0"));
        }

        if self.synthesis.max_concurrent_subquestions == 0 {
            return Err(Error::config("synthesis.max_concurrent_subquestions must be > 0"));
        }
        if self.synthesis.subquestion_timeout_secs == 0 || self.synthesis.query_deadline_secs == 0 {
            return Err(Error::config("synthesis timeouts must be > 0"));
        }

        if self.milvus.max_page_chunks == 0 {
            return Err(Error::config("milvus.max_page_chunks must be > 0"));
        }

        Ok(())
    }
}

/// One provider tier of the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    pub kind: ProviderKind,
    /// Model names in priority order
    pub models: Vec<String>,
}

impl TierConfig {
    fn validate(&self, section: &str) -> Result<()> {
        if self.models.iter().all(|m| m.trim().is_empty()) {
            return Err(Error::config(format!("{}.models must not be empty", section)));
        }
        Ok(())
    }
}

/// LLM gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Ceiling for the local prompt token estimate
    pub max_prompt_tokens: usize,
    /// Reset a tier's cursor to its preferred pair after this long (None = stay sticky)
    pub sticky_reset_secs: Option<u64>,
    pub primary: TierConfig,
    pub fallback: Option<TierConfig>,
}

impl GatewayConfig {
    pub fn sticky_reset(&self) -> Option<Duration> {
        self.sticky_reset_secs.map(Duration::from_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_prompt_tokens: 1_000_000,
            sticky_reset_secs: None,
            primary: TierConfig {
                kind: ProviderKind::Gemini,
                models: vec![
                    "gemini-2.5-flash".to_string(),
                    "gemini-2.0-flash".to_string(),
                    "gemini-flash-latest".to_string(),
                    "gemini-pro-latest".to_string(),
                ],
            },
            fallback: Some(TierConfig {
                kind: ProviderKind::Ollama,
                models: vec!["llama3:latest".to_string()],
            }),
        }
    }
}

/// Gemini REST configuration. API keys come from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub base_url: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            temperature: 0.3,
            timeout_secs: 120,
        }
    }
}

/// Ollama configuration (generation fallback and query embeddings)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Embedding model name
    pub embed_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed embedding requests
    pub max_retries: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            temperature: 0.3,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Milvus REST configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MilvusConfig {
    pub base_url: String,
    /// Bearer token (`user:password` or API key)
    pub token: Option<String>,
    /// Vector field searched
    pub anns_field: String,
    pub text_field: String,
    pub page_field: String,
    pub source_field: String,
    pub metric_type: String,
    pub nprobe: u32,
    /// Limit for a page-range query
    pub max_page_chunks: usize,
    pub timeout_secs: u64,
}

impl Default for MilvusConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:19530".to_string(),
            token: None,
            anns_field: "embedding".to_string(),
            text_field: "text".to_string(),
            page_field: "page".to_string(),
            source_field: "pdf_source".to_string(),
            metric_type: "L2".to_string(),
            nprobe: 10,
            max_page_chunks: 200,
            timeout_secs: 30,
        }
    }
}

/// Multi-collection retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Hits requested per collection
    pub top_k: usize,
    /// Minimum `1 / (1 + distance)` for a hit to be kept
    pub similarity_threshold: f32,
    pub max_concurrent_collections: usize,
    pub collection_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 15,
            similarity_threshold: 0.15,
            max_concurrent_collections: 8,
            collection_timeout_secs: 30,
        }
    }
}

/// Page-range expansion around hits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub margin_before: u32,
    pub margin_after: u32,
    pub fetch_timeout_secs: u64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            margin_before: 1,
            margin_after: 2,
            fetch_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompositionConfig {
    pub enabled: bool,
    /// Fragments must be longer than this to count
    pub min_fragment_chars: usize,
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_fragment_chars: 8,
        }
    }
}

/// Per-query orchestration limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub max_concurrent_subquestions: usize,
    pub subquestion_timeout_secs: u64,
    /// Bound on the whole pipeline for one question
    pub query_deadline_secs: u64,
    /// Output token limit passed to the providers
    pub max_tokens_hint: Option<u32>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_concurrent_subquestions: 4,
            subquestion_timeout_secs: 120,
            query_deadline_secs: 300,
            max_tokens_hint: Some(2048),
        }
    }
}

/// Topic suggestions for no-results answers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionConfig {
    pub enabled: bool,
    /// Chunks sampled per collection
    pub sample_size: usize,
    /// Topics kept per collection
    pub max_topics: usize,
    pub questions_per_topic: usize,
    /// Suggestions returned in total
    pub max_suggestions: usize,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_size: 50,
            max_topics: 5,
            questions_per_topic: 2,
            max_suggestions: 5,
        }
    }
}
