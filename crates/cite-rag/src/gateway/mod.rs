//! LLM gateway: model × credential fallback within a provider, then across providers
//!
//! Each provider tier sweeps its own matrix with a shared, forward-only
//! cursor ([`GatewayCursor`]). The tiers themselves are tried in order: the
//! primary is run to exhaustion before the next tier is attempted once.

pub mod cursor;
pub mod provider;

pub use cursor::{CursorPosition, GatewayCursor};
pub use provider::{ProviderGateway, TierStatus};

use crate::error::{Error, Result};

/// Rough token count for a prompt: one token per four characters, rounded up
pub fn estimate_tokens(prompt: &str) -> usize {
    prompt.chars().count().div_ceil(4)
}

/// Text generation with bounded-effort fallback
pub struct LlmGateway {
    tiers: Vec<ProviderGateway>,
    max_prompt_tokens: usize,
}

impl LlmGateway {
    /// Tiers in fallback order, primary first
    pub fn new(tiers: Vec<ProviderGateway>, max_prompt_tokens: usize) -> Self {
        Self {
            tiers,
            max_prompt_tokens,
        }
    }

    pub fn max_prompt_tokens(&self) -> usize {
        self.max_prompt_tokens
    }

    /// Generate text for `prompt`.
    ///
    /// Fails with [`Error::PromptTooLarge`] before any provider is contacted
    /// when the estimate exceeds the ceiling, and with
    /// [`Error::ProviderExhausted`] when the last tier is exhausted.
    pub async fn generate(&self, prompt: &str, max_tokens_hint: Option<u32>) -> Result<String> {
        let estimated = estimate_tokens(prompt);
        if estimated > self.max_prompt_tokens {
            tracing::warn!(
                "Prompt too large: ~{} tokens (limit {})",
                estimated,
                self.max_prompt_tokens
            );
            return Err(Error::PromptTooLarge {
                estimated,
                limit: self.max_prompt_tokens,
            });
        }

        let mut last_exhausted = None;

        for (i, tier) in self.tiers.iter().enumerate() {
            match tier.generate(prompt, max_tokens_hint).await {
                Ok(text) => return Ok(text),
                Err(e @ Error::ProviderExhausted { .. }) => {
                    if let Some(next) = self.tiers.get(i + 1) {
                        tracing::warn!(
                            "{}; falling back to {}",
                            e,
                            next.provider()
                        );
                    }
                    last_exhausted = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_exhausted.unwrap_or(Error::ProviderExhausted {
            provider: "none".to_string(),
            attempts: 0,
        }))
    }

    /// Status of every tier in fallback order
    pub fn status(&self) -> Vec<TierStatus> {
        self.tiers.iter().map(ProviderGateway::status).collect()
    }
}
