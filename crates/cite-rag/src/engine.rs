//! Engine: every component wired once from configuration

use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{RagConfig, TierConfig};
use crate::error::{Error, Result};
use crate::gateway::{LlmGateway, ProviderGateway, TierStatus};
use crate::generation::{AnswerSynthesizer, SynthesisSettings};
use crate::providers::{GeminiBackend, LlmBackend, MilvusClient, OllamaBackend, OllamaEmbedder};
use crate::query::QueryDecomposer;
use crate::retrieval::{ContextWindowBuilder, RetrievalAggregator};
use crate::suggest::KeywordTopicSuggester;
use crate::types::{Answer, Credential, ModelEndpoint, ProviderKind};

/// Query engine shared by reference between callers
pub struct RagEngine {
    synthesizer: Arc<AnswerSynthesizer>,
}

impl RagEngine {
    /// Wrap an already assembled synthesizer
    pub fn new(synthesizer: AnswerSynthesizer) -> Self {
        Self {
            synthesizer: Arc::new(synthesizer),
        }
    }

    /// Build against Gemini keys from the environment
    pub fn from_env(config: &RagConfig) -> Result<Self> {
        Self::from_config(config, Credential::from_env(ProviderKind::Gemini))
    }

    /// Build the Milvus, Ollama and Gemini clients and the full pipeline.
    ///
    /// `credentials` are split by provider. A Gemini tier without keys is
    /// skipped; an Ollama tier always gets the implicit local credential.
    pub fn from_config(config: &RagConfig, credentials: Vec<Credential>) -> Result<Self> {
        config.validate()?;

        let mut tiers = Vec::new();
        for tier in std::iter::once(&config.gateway.primary).chain(config.gateway.fallback.as_ref()) {
            if let Some(gateway) = build_tier(config, tier, &credentials)? {
                tiers.push(gateway);
            }
        }
        if tiers.is_empty() {
            return Err(Error::config(
                "no usable LLM tier: set GEMINI_API_KEY or configure an ollama tier",
            ));
        }
        let gateway = Arc::new(LlmGateway::new(tiers, config.gateway.max_prompt_tokens));

        let milvus = Arc::new(MilvusClient::new(config.milvus.clone())?);
        let embedder = Arc::new(OllamaEmbedder::new(&config.ollama)?);

        let aggregator = RetrievalAggregator::new(
            embedder,
            milvus.clone(),
            config.retrieval.max_concurrent_collections,
            Duration::from_secs(config.retrieval.collection_timeout_secs),
        );
        let context = ContextWindowBuilder::new(
            milvus.clone(),
            config.context.margin_before,
            config.context.margin_after,
            Duration::from_secs(config.context.fetch_timeout_secs),
        );
        let decomposer = QueryDecomposer::new(
            config.decomposition.min_fragment_chars,
            config.decomposition.enabled,
        )?;

        let mut synthesizer = AnswerSynthesizer::new(
            decomposer,
            aggregator,
            context,
            gateway,
            SynthesisSettings::from_config(config),
        );
        if config.suggestions.enabled {
            let suggester = KeywordTopicSuggester::new(milvus, config.suggestions.clone())?;
            synthesizer = synthesizer.with_suggester(Arc::new(suggester));
        }

        tracing::info!("Query engine ready");
        Ok(Self::new(synthesizer))
    }

    /// Answer a question over the given collections
    pub async fn ask(&self, question: &str, collection_ids: &[String]) -> Answer {
        let span = tracing::info_span!("query", id = %Uuid::new_v4());
        self.synthesizer
            .answer(question, collection_ids)
            .instrument(span)
            .await
    }

    /// Provider, matrix size and cursor of every gateway tier
    pub fn gateway_status(&self) -> Vec<TierStatus> {
        self.synthesizer.gateway().status()
    }
}

fn build_tier(
    config: &RagConfig,
    tier: &TierConfig,
    credentials: &[Credential],
) -> Result<Option<ProviderGateway>> {
    let models = ModelEndpoint::ranked(tier.kind, &tier.models);

    let (backend, keys): (Arc<dyn LlmBackend>, Vec<Credential>) = match tier.kind {
        ProviderKind::Gemini => {
            let keys: Vec<Credential> = credentials
                .iter()
                .filter(|c| c.provider == ProviderKind::Gemini)
                .cloned()
                .collect();
            if keys.is_empty() {
                tracing::warn!("No Gemini API keys found, skipping gemini tier");
                return Ok(None);
            }
            (Arc::new(GeminiBackend::new(&config.gemini)?), keys)
        }
        ProviderKind::Ollama => {
            let mut keys: Vec<Credential> = credentials
                .iter()
                .filter(|c| c.provider == ProviderKind::Ollama)
                .cloned()
                .collect();
            if keys.is_empty() {
                keys.push(Credential::local());
            }
            (Arc::new(OllamaBackend::new(&config.ollama)?), keys)
        }
    };

    tracing::info!(
        "{} tier: {} model(s) x {} credential(s)",
        tier.kind,
        models.len(),
        keys.len()
    );

    Ok(Some(
        ProviderGateway::new(backend, models, keys).with_reset_after(config.gateway.sticky_reset()),
    ))
}
