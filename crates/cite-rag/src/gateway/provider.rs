//! One provider tier: a backend swept over its model × credential matrix

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::providers::LlmBackend;
use crate::types::{Credential, ModelEndpoint, ProviderKind};

use super::cursor::{CursorPosition, GatewayCursor};

/// Snapshot of a tier for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct TierStatus {
    pub provider: ProviderKind,
    pub models: Vec<String>,
    pub credentials: usize,
    pub position: CursorPosition,
    pub exhausted: bool,
}

/// Fallback over the models and credentials of a single provider
pub struct ProviderGateway {
    backend: Arc<dyn LlmBackend>,
    models: Vec<ModelEndpoint>,
    credentials: Vec<Credential>,
    cursor: GatewayCursor,
}

impl ProviderGateway {
    /// `models` must be in priority order
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        models: Vec<ModelEndpoint>,
        credentials: Vec<Credential>,
    ) -> Self {
        let cursor = GatewayCursor::new(models.len(), credentials.len());
        Self {
            backend,
            models,
            credentials,
            cursor,
        }
    }

    /// Periodically return to the preferred pair, see [`GatewayCursor::with_reset_after`]
    pub fn with_reset_after(mut self, period: Option<Duration>) -> Self {
        self.cursor = self.cursor.with_reset_after(period);
        self
    }

    pub fn provider(&self) -> ProviderKind {
        self.backend.kind()
    }

    pub fn cursor(&self) -> &GatewayCursor {
        &self.cursor
    }

    /// Generate with the first working pair at or after the shared cursor.
    ///
    /// Success leaves the cursor where it is. Rejected content and transport
    /// failures end the call. Otherwise the call fails with
    /// [`Error::ProviderExhausted`] once every remaining pair has failed.
    pub async fn generate(&self, prompt: &str, max_tokens: Option<u32>) -> Result<String> {
        let provider = self.backend.name().to_string();
        let mut position = self.cursor.start();
        let mut attempts = 0usize;

        while !self.cursor.is_exhausted(position) {
            let (Some(model), Some(credential)) = (
                self.models.get(position.model),
                self.credentials.get(position.credential),
            ) else {
                break;
            };

            attempts += 1;
            tracing::info!(
                "[{}] attempt {}: model={} key={} ({})",
                provider,
                attempts,
                model.name,
                credential.id,
                credential.masked()
            );

            let outcome = self
                .backend
                .call(prompt, model, credential, max_tokens)
                .await
                .map_err(|e| e.redact(credential.secret()));

            match outcome {
                Ok(text) => {
                    tracing::info!("[{}] success with model={} key={}", provider, model.name, credential.id);
                    return Ok(text);
                }
                Err(e) if e.kind.is_fatal() => {
                    tracing::error!("[{}] {} on model={}, giving up", provider, e, model.name);
                    return Err(Error::Provider(e));
                }
                Err(e) => {
                    tracing::warn!(
                        "[{}] {} on model={} key={}",
                        provider,
                        e.kind,
                        model.name,
                        credential.id
                    );
                    position = self.cursor.advance(position, e.kind);
                }
            }
        }

        tracing::error!("[{}] all model/key combinations failed after {} attempts", provider, attempts);
        Err(Error::ProviderExhausted { provider, attempts })
    }

    pub fn status(&self) -> TierStatus {
        let position = self.cursor.position();
        TierStatus {
            provider: self.provider(),
            models: self.models.iter().map(|m| m.name.clone()).collect(),
            credentials: self.credentials.len(),
            position,
            exhausted: self.cursor.is_exhausted(position),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::providers::llm::{ProviderError, ProviderErrorKind};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use proptest::prelude::*;
    use std::collections::{HashMap, HashSet};

    /// Backend whose outcome per (model, credential id) is scripted up front.
    /// Unscripted pairs succeed with "<model>/<key>".
    pub(crate) struct ScriptedBackend {
        kind: ProviderKind,
        failures: HashMap<(String, String), ProviderErrorKind>,
        pub calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedBackend {
        pub fn new(kind: ProviderKind) -> Self {
            Self {
                kind,
                failures: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn fail(mut self, model: &str, key: &str, kind: ProviderErrorKind) -> Self {
            self.failures.insert((model.to_string(), key.to_string()), kind);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn call(
            &self,
            _prompt: &str,
            model: &ModelEndpoint,
            credential: &Credential,
            _max_tokens: Option<u32>,
        ) -> std::result::Result<String, ProviderError> {
            let key = (model.name.clone(), credential.id.clone());
            self.calls.lock().push(key.clone());
            match self.failures.get(&key) {
                Some(kind) => Err(ProviderError::new(*kind, "scripted")),
                None => Ok(format!("{}/{}", key.0, key.1)),
            }
        }

        fn kind(&self) -> ProviderKind {
            self.kind
        }
    }

    pub(crate) fn models(names: &[&str]) -> Vec<ModelEndpoint> {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        ModelEndpoint::ranked(ProviderKind::Gemini, &names)
    }

    pub(crate) fn keys(ids: &[&str]) -> Vec<Credential> {
        ids.iter()
            .map(|id| Credential::new(*id, ProviderKind::Gemini, format!("secret-{}", id)))
            .collect()
    }

    #[tokio::test]
    async fn test_sticky_success_after_quota() {
        let backend = Arc::new(
            ScriptedBackend::new(ProviderKind::Gemini).fail(
                "m1",
                "k1",
                ProviderErrorKind::QuotaOrRateLimited,
            ),
        );
        let gateway = ProviderGateway::new(backend.clone(), models(&["m1", "m2"]), keys(&["k1", "k2"]));

        assert_eq!(gateway.generate("q", None).await.unwrap(), "m1/k2");
        assert_eq!(gateway.cursor().position(), CursorPosition::new(0, 1));

        // next call starts from (m1, k2), not (m1, k1)
        assert_eq!(gateway.generate("q", None).await.unwrap(), "m1/k2");
        let calls = backend.calls.lock().clone();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2], ("m1".to_string(), "k2".to_string()));
    }

    #[tokio::test]
    async fn test_model_unavailable_skips_remaining_keys() {
        let backend = Arc::new(
            ScriptedBackend::new(ProviderKind::Gemini).fail(
                "m1",
                "k1",
                ProviderErrorKind::ModelUnavailable,
            ),
        );
        let gateway = ProviderGateway::new(backend.clone(), models(&["m1", "m2"]), keys(&["k1", "k2"]));

        assert_eq!(gateway.generate("q", None).await.unwrap(), "m2/k1");
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_content_rejected_propagates() {
        let backend = Arc::new(
            ScriptedBackend::new(ProviderKind::Gemini).fail(
                "m1",
                "k1",
                ProviderErrorKind::ContentRejected,
            ),
        );
        let gateway = ProviderGateway::new(backend.clone(), models(&["m1", "m2"]), keys(&["k1", "k2"]));

        let err = gateway.generate("q", None).await.unwrap_err();
        assert!(matches!(err, Error::Provider(ref e) if e.kind == ProviderErrorKind::ContentRejected));
        assert_eq!(backend.call_count(), 1);
        assert_eq!(gateway.cursor().position(), CursorPosition::ORIGIN);
    }

    /// Fails every call with an error message quoting the key it was given
    struct LeakyBackend;

    #[async_trait]
    impl LlmBackend for LeakyBackend {
        async fn call(
            &self,
            _prompt: &str,
            _model: &ModelEndpoint,
            credential: &Credential,
            _max_tokens: Option<u32>,
        ) -> std::result::Result<String, ProviderError> {
            Err(ProviderError::transport(format!(
                "error sending request for url (http://host/generate?key={})",
                credential.secret()
            )))
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::Gemini
        }
    }

    #[tokio::test]
    async fn test_secret_never_surfaces_in_errors() {
        let keys = vec![Credential::new("k1", ProviderKind::Gemini, "AIzaSyTOPSECRET0123456789")];
        let gateway = ProviderGateway::new(Arc::new(LeakyBackend), models(&["m1"]), keys);

        let err = gateway.generate("q", None).await.unwrap_err();
        let text = err.to_string();
        assert!(matches!(err, Error::Provider(ref e) if e.kind == ProviderErrorKind::Transport));
        assert!(!text.contains("TOPSECRET"), "secret leaked: {}", text);
        assert!(text.contains("key=***"));
    }

    #[tokio::test]
    async fn test_exhaustion_then_fresh_sweep() {
        let backend = Arc::new(
            ScriptedBackend::new(ProviderKind::Gemini)
                .fail("m1", "k1", ProviderErrorKind::QuotaOrRateLimited)
                .fail("m1", "k2", ProviderErrorKind::InvalidCredential)
                .fail("m2", "k1", ProviderErrorKind::QuotaOrRateLimited)
                .fail("m2", "k2", ProviderErrorKind::QuotaOrRateLimited),
        );
        let gateway = ProviderGateway::new(backend.clone(), models(&["m1", "m2"]), keys(&["k1", "k2"]));

        let err = gateway.generate("q", None).await.unwrap_err();
        assert!(matches!(err, Error::ProviderExhausted { attempts: 4, .. }));
        assert!(gateway.status().exhausted);

        let _ = gateway.generate("q", None).await;
        assert_eq!(backend.call_count(), 8);
    }

    #[tokio::test]
    async fn test_no_credentials_exhausts_without_calls() {
        let backend = Arc::new(ScriptedBackend::new(ProviderKind::Gemini));
        let gateway = ProviderGateway::new(backend.clone(), models(&["m1"]), Vec::new());

        let err = gateway.generate("q", None).await.unwrap_err();
        assert!(matches!(err, Error::ProviderExhausted { attempts: 0, .. }));
        assert_eq!(backend.call_count(), 0);
    }

    fn kind_strategy() -> impl Strategy<Value = Option<ProviderErrorKind>> {
        prop_oneof![
            Just(None),
            Just(Some(ProviderErrorKind::QuotaOrRateLimited)),
            Just(Some(ProviderErrorKind::InvalidCredential)),
            Just(Some(ProviderErrorKind::ModelUnavailable)),
        ]
    }

    proptest! {
        #[test]
        fn never_retries_a_failed_pair(
            n_models in 1usize..4,
            n_keys in 1usize..4,
            outcomes in proptest::collection::vec(kind_strategy(), 16),
        ) {
            let model_names: Vec<String> = (0..n_models).map(|i| format!("m{}", i)).collect();
            let key_ids: Vec<String> = (0..n_keys).map(|i| format!("k{}", i)).collect();

            let mut backend = ScriptedBackend::new(ProviderKind::Gemini);
            for (mi, m) in model_names.iter().enumerate() {
                for (ki, k) in key_ids.iter().enumerate() {
                    if let Some(kind) = outcomes[mi * 4 + ki] {
                        backend = backend.fail(m, k, kind);
                    }
                }
            }
            let backend = Arc::new(backend);

            let m_refs: Vec<&str> = model_names.iter().map(String::as_str).collect();
            let k_refs: Vec<&str> = key_ids.iter().map(String::as_str).collect();
            let gateway = ProviderGateway::new(backend.clone(), models(&m_refs), keys(&k_refs));

            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let result = runtime.block_on(gateway.generate("q", None));

            let calls = backend.calls.lock().clone();
            let unique: HashSet<_> = calls.iter().cloned().collect();
            prop_assert_eq!(unique.len(), calls.len());
            prop_assert!(calls.len() <= n_models * n_keys);
            prop_assert!(matches!(result, Ok(_) | Err(Error::ProviderExhausted { .. })), "unexpected result: {:?}", result);
        }
    }
}
