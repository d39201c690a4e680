//! Provider configuration types: credentials and model endpoints

use serde::{Deserialize, Serialize};
use std::fmt;

/// LLM provider family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Gemini (cloud, API keys)
    Gemini,
    /// Ollama (local runtime, no credentials)
    Ollama,
}

impl ProviderKind {
    /// Lowercase name used in logs and config
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque provider key, supplied at startup and never mutated
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Where the key came from (e.g. `GEMINI_API_KEY_2`)
    pub id: String,
    /// Provider this key belongs to
    pub provider: ProviderKind,
    secret: String,
}

impl Credential {
    /// Create a credential
    pub fn new(id: impl Into<String>, provider: ProviderKind, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider,
            secret: secret.into(),
        }
    }

    /// Implicit credential for providers that need none (local Ollama)
    pub fn local() -> Self {
        Self::new("local", ProviderKind::Ollama, "")
    }

    /// Raw secret, only for building the outgoing request
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Secret with the middle elided, safe for logs
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.secret.chars().collect();
        if chars.len() > 12 {
            let head: String = chars[..8].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{}...{}", head, tail)
        } else {
            "***".to_string()
        }
    }

    /// Credentials for a provider tier, in rotation order
    pub fn from_env(provider: ProviderKind) -> Vec<Credential> {
        match provider {
            ProviderKind::Gemini => Self::gemini_from_env(),
            ProviderKind::Ollama => vec![Self::local()],
        }
    }

    /// Load Gemini keys from the environment.
    ///
    /// Slot 1 accepts `GEMINI_API_KEY` or `GEMINI_API_KEY_1`; slots 2..=9 use
    /// `GEMINI_API_KEY_<n>`. Empty values and repeated keys are skipped.
    pub fn gemini_from_env() -> Vec<Credential> {
        Self::gemini_from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Credential::gemini_from_env`] over an arbitrary lookup
    pub fn gemini_from_lookup<F>(lookup: F) -> Vec<Credential>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut keys: Vec<Credential> = Vec::new();

        for slot in 1..=9 {
            let names: Vec<String> = if slot == 1 {
                vec!["GEMINI_API_KEY".to_string(), "GEMINI_API_KEY_1".to_string()]
            } else {
                vec![format!("GEMINI_API_KEY_{}", slot)]
            };

            for name in names {
                let Some(value) = lookup(&name) else { continue };
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }
                if !keys.iter().any(|k| k.secret == value) {
                    keys.push(Credential::new(name, ProviderKind::Gemini, value));
                }
                break;
            }
        }

        keys
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("secret", &self.masked())
            .finish()
    }
}

/// One model of a provider, ranked by priority (0 = preferred)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEndpoint {
    pub provider: ProviderKind,
    pub name: String,
    pub priority: usize,
}

impl ModelEndpoint {
    /// Build an ordered endpoint list from model names in priority order
    pub fn ranked(provider: ProviderKind, names: &[String]) -> Vec<ModelEndpoint> {
        names
            .iter()
            .enumerate()
            .map(|(priority, name)| ModelEndpoint {
                provider,
                name: name.clone(),
                priority,
            })
            .collect()
    }
}
