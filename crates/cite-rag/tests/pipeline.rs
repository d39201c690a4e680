//! End-to-end pipeline runs against in-memory collaborators

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cite_rag::error::{Error, Result};
use cite_rag::gateway::{CursorPosition, LlmGateway, ProviderGateway};
use cite_rag::providers::{
    Embedder, LlmBackend, PageFetcher, ProviderError, ProviderErrorKind, VectorStore,
};
use cite_rag::types::{Credential, ModelEndpoint, PageChunk, ProviderKind, SearchHit};
use cite_rag::{
    AnswerSynthesizer, ContextWindowBuilder, QueryDecomposer, RagEngine, RetrievalAggregator,
    SynthesisSettings, TopicSuggester,
};

const TOPICS: &[&str] = &["refund", "shipping", "warranty"];

struct TopicEmbedder;

#[async_trait]
impl Embedder for TopicEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let lower = text.to_lowercase();
        Ok(TOPICS
            .iter()
            .map(|t| if lower.contains(t) { 1.0 } else { 0.0 })
            .collect())
    }

    fn name(&self) -> &str {
        "topic"
    }
}

struct Doc {
    collection: &'static str,
    topic: &'static str,
    source: &'static str,
    page: u32,
    distance: f32,
}

/// Vector store over a fixed document list; `broken` collections always error
struct MemoryStore {
    docs: Vec<Doc>,
    broken: Vec<&'static str>,
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn search(&self, collection_id: &str, embedding: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if self.broken.contains(&collection_id) {
            return Err(Error::vector_store("collection is offline"));
        }

        let wanted: Vec<&str> = embedding
            .iter()
            .zip(TOPICS)
            .filter(|(v, _)| **v > 0.0)
            .map(|(_, t)| *t)
            .collect();

        Ok(self
            .docs
            .iter()
            .filter(|d| d.collection == collection_id && wanted.contains(&d.topic))
            .take(k)
            .enumerate()
            .map(|(rank, d)| SearchHit {
                collection_id: collection_id.to_string(),
                text: format!("{} hit on page {}", d.topic, d.page),
                page: d.page,
                source: d.source.to_string(),
                distance: d.distance,
                rank,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Serves every page in the requested range and records the ranges
#[derive(Default)]
struct MemoryPages {
    requests: Mutex<Vec<(String, u32, u32)>>,
}

#[async_trait]
impl PageFetcher for MemoryPages {
    async fn fetch_pages(
        &self,
        _collection_id: &str,
        source: &str,
        page_min: u32,
        page_max: u32,
    ) -> Result<Vec<PageChunk>> {
        self.requests.lock().push((source.to_string(), page_min, page_max));
        Ok((page_min..=page_max)
            .map(|page| PageChunk {
                page,
                text: format!("{} page {} text", source, page),
            })
            .collect())
    }
}

/// Backend failing scripted (model, key) pairs and logging every attempt
struct Backend {
    kind: ProviderKind,
    failures: HashMap<(String, String), ProviderErrorKind>,
    calls: Mutex<Vec<(String, String)>>,
    prompts: Mutex<Vec<String>>,
}

impl Backend {
    fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            failures: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn fail(mut self, model: &str, key: &str, kind: ProviderErrorKind) -> Self {
        self.failures.insert((model.to_string(), key.to_string()), kind);
        self
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl LlmBackend for Backend {
    async fn call(
        &self,
        prompt: &str,
        model: &ModelEndpoint,
        credential: &Credential,
        _max_tokens: Option<u32>,
    ) -> std::result::Result<String, ProviderError> {
        let pair = (model.name.clone(), credential.id.clone());
        self.calls.lock().push(pair.clone());
        self.prompts.lock().push(prompt.to_string());

        if let Some(kind) = self.failures.get(&pair) {
            return Err(ProviderError::new(*kind, "scripted failure"));
        }
        if prompt.contains("PARTIAL ANSWERS") {
            return Ok(format!("{} merged answer", self.kind));
        }
        Ok(format!("{} answer from {}/{}", self.kind, pair.0, pair.1))
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }
}

struct StaticSuggester;

#[async_trait]
impl TopicSuggester for StaticSuggester {
    async fn suggest(&self, _collection_ids: &[String]) -> Result<Vec<String>> {
        Ok(vec!["What does the warranty cover?".to_string()])
    }
}

fn docs() -> Vec<Doc> {
    vec![
        Doc { collection: "policies", topic: "refund", source: "A.pdf", page: 3, distance: 0.1 },
        Doc { collection: "policies", topic: "refund", source: "A.pdf", page: 5, distance: 0.3 },
        Doc { collection: "manuals", topic: "refund", source: "A.pdf", page: 3, distance: 0.2 },
        Doc { collection: "manuals", topic: "shipping", source: "B.pdf", page: 1, distance: 0.4 },
        Doc { collection: "policies", topic: "warranty", source: "C.pdf", page: 9, distance: 25.0 },
    ]
}

fn gemini_tier(backend: Arc<Backend>) -> ProviderGateway {
    let models = ModelEndpoint::ranked(ProviderKind::Gemini, &["m1".to_string(), "m2".to_string()]);
    let keys = vec![
        Credential::new("k1", ProviderKind::Gemini, "secret-1"),
        Credential::new("k2", ProviderKind::Gemini, "secret-2"),
    ];
    ProviderGateway::new(backend, models, keys)
}

fn ollama_tier(backend: Arc<Backend>) -> ProviderGateway {
    let models = ModelEndpoint::ranked(ProviderKind::Ollama, &["llama3:latest".to_string()]);
    ProviderGateway::new(backend, models, vec![Credential::local()])
}

fn engine(tiers: Vec<ProviderGateway>, pages: Arc<MemoryPages>, broken: Vec<&'static str>) -> RagEngine {
    let aggregator = RetrievalAggregator::new(
        Arc::new(TopicEmbedder),
        Arc::new(MemoryStore { docs: docs(), broken }),
        8,
        Duration::from_secs(5),
    );
    let context = ContextWindowBuilder::new(pages, 1, 2, Duration::from_secs(5));
    let synthesizer = AnswerSynthesizer::new(
        QueryDecomposer::new(8, true).unwrap(),
        aggregator,
        context,
        Arc::new(LlmGateway::new(tiers, 1_000_000)),
        SynthesisSettings {
            similarity_threshold: 0.10,
            ..SynthesisSettings::default()
        },
    )
    .with_suggester(Arc::new(StaticSuggester));
    RagEngine::new(synthesizer)
}

fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn sticky_success_survives_across_questions() {
    let gemini = Arc::new(
        Backend::new(ProviderKind::Gemini).fail("m1", "k1", ProviderErrorKind::QuotaOrRateLimited),
    );
    let engine = engine(vec![gemini_tier(gemini.clone())], Arc::default(), vec![]);

    let first = engine.ask("What is the refund policy?", &ids(&["policies"])).await;
    assert_eq!(first.text, "gemini answer from m1/k2");

    let second = engine.ask("Explain the refund window", &ids(&["policies"])).await;
    assert_eq!(second.text, "gemini answer from m1/k2");

    let pair = |m: &str, k: &str| (m.to_string(), k.to_string());
    assert_eq!(
        gemini.calls(),
        vec![pair("m1", "k1"), pair("m1", "k2"), pair("m1", "k2")]
    );
    assert_eq!(engine.gateway_status()[0].position, CursorPosition::new(0, 1));
}

#[tokio::test]
async fn exhausted_primary_falls_back_to_local_tier() {
    let gemini = Arc::new(
        Backend::new(ProviderKind::Gemini)
            .fail("m1", "k1", ProviderErrorKind::QuotaOrRateLimited)
            .fail("m1", "k2", ProviderErrorKind::InvalidCredential)
            .fail("m2", "k1", ProviderErrorKind::ModelUnavailable),
    );
    let ollama = Arc::new(Backend::new(ProviderKind::Ollama));
    let engine = engine(
        vec![gemini_tier(gemini.clone()), ollama_tier(ollama.clone())],
        Arc::default(),
        vec![],
    );

    let answer = engine.ask("What is the refund policy?", &ids(&["policies"])).await;

    assert_eq!(answer.text, "ollama answer from llama3:latest/local");
    // m2 is skipped entirely once it reports model-unavailable
    assert_eq!(gemini.calls().len(), 3);
    assert_eq!(ollama.calls().len(), 1);
    assert!(engine.gateway_status()[0].exhausted);
}

#[tokio::test]
async fn context_is_expanded_around_hit_pages() {
    let gemini = Arc::new(Backend::new(ProviderKind::Gemini));
    let pages = Arc::new(MemoryPages::default());
    let engine = engine(vec![gemini_tier(gemini.clone())], pages.clone(), vec![]);

    let answer = engine.ask("What is the refund policy?", &ids(&["policies"])).await;

    assert!(answer.had_results);
    assert_eq!(*pages.requests.lock(), vec![("A.pdf".to_string(), 2, 7)]);

    let prompt = gemini.prompts.lock()[0].clone();
    for page in 2..=7 {
        assert!(prompt.contains(&format!("--- A.pdf, Page {} ---", page)));
    }
    let keys: Vec<(&str, u32)> = answer.citations.iter().map(|c| c.key()).collect();
    assert_eq!(keys, vec![("A.pdf", 3), ("A.pdf", 5)]);
}

#[tokio::test]
async fn nothing_above_threshold_is_no_results_without_generation() {
    let gemini = Arc::new(Backend::new(ProviderKind::Gemini));
    let engine = engine(vec![gemini_tier(gemini.clone())], Arc::default(), vec![]);

    // warranty only exists far away (similarity ~0.04)
    let answer = engine
        .ask("What does the warranty say?", &ids(&["policies", "manuals", "archive"]))
        .await;

    assert!(answer.is_no_results());
    assert!(answer.citations.is_empty());
    assert_eq!(answer.suggestions, vec!["What does the warranty cover?".to_string()]);
    assert!(gemini.calls().is_empty());
}

#[tokio::test]
async fn compound_question_merges_parts_and_tolerates_broken_collection() {
    let gemini = Arc::new(Backend::new(ProviderKind::Gemini));
    let engine = engine(
        vec![gemini_tier(gemini.clone())],
        Arc::default(),
        vec!["archive"],
    );

    let answer = engine
        .ask(
            "What is the refund policy and how long does shipping take?",
            &ids(&["policies", "manuals", "archive"]),
        )
        .await;

    assert_eq!(answer.text, "gemini merged answer");
    assert_eq!(answer.sub_answers.len(), 2);
    assert!(answer.sub_answers.iter().all(|p| p.had_results));

    // A.pdf page 3 is hit in two collections but cited once
    let keys: Vec<(&str, u32)> = answer.citations.iter().map(|c| c.key()).collect();
    assert_eq!(keys, vec![("A.pdf", 3), ("A.pdf", 5), ("B.pdf", 1)]);

    // two parts plus one synthesis call
    assert_eq!(gemini.calls().len(), 3);
}

#[tokio::test]
async fn content_rejection_degrades_instead_of_failing() {
    let gemini = Arc::new(
        Backend::new(ProviderKind::Gemini).fail("m1", "k1", ProviderErrorKind::ContentRejected),
    );
    let ollama = Arc::new(Backend::new(ProviderKind::Ollama));
    let engine = engine(
        vec![gemini_tier(gemini.clone()), ollama_tier(ollama.clone())],
        Arc::default(),
        vec![],
    );

    let answer = engine.ask("What is the refund policy?", &ids(&["policies"])).await;

    assert!(answer.had_results);
    assert!(answer.sub_answers[0].generation_failed);
    assert!(!answer.citations.is_empty());
    assert_eq!(gemini.calls().len(), 1);
    assert!(ollama.calls().is_empty());
}
