//! Top-level answer pipeline: decompose, answer each part, merge

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{timeout_at, Instant};

use crate::config::RagConfig;
use crate::gateway::LlmGateway;
use crate::query::QueryDecomposer;
use crate::retrieval::{ContextWindowBuilder, RetrievalAggregator};
use crate::suggest::TopicSuggester;
use crate::types::{Answer, SubAnswer, SubQuestion};

use super::citation::{collect_citations, CitationSet};
use super::prompt::{PromptBuilder, NO_INFORMATION, NO_RESULTS};

/// Per-query limits of the synthesizer
#[derive(Debug, Clone)]
pub struct SynthesisSettings {
    pub top_k: usize,
    pub similarity_threshold: f32,
    pub max_concurrent_subquestions: usize,
    pub subquestion_timeout: Duration,
    pub query_deadline: Duration,
    pub max_tokens_hint: Option<u32>,
}

impl SynthesisSettings {
    pub fn from_config(config: &RagConfig) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            similarity_threshold: config.retrieval.similarity_threshold,
            max_concurrent_subquestions: config.synthesis.max_concurrent_subquestions,
            subquestion_timeout: Duration::from_secs(config.synthesis.subquestion_timeout_secs),
            query_deadline: Duration::from_secs(config.synthesis.query_deadline_secs),
            max_tokens_hint: config.synthesis.max_tokens_hint,
        }
    }
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self::from_config(&RagConfig::default())
    }
}

/// Coordinates decomposition, retrieval, context assembly and generation
pub struct AnswerSynthesizer {
    decomposer: QueryDecomposer,
    aggregator: RetrievalAggregator,
    context: ContextWindowBuilder,
    gateway: Arc<LlmGateway>,
    suggester: Option<Arc<dyn TopicSuggester>>,
    settings: SynthesisSettings,
}

impl AnswerSynthesizer {
    pub fn new(
        decomposer: QueryDecomposer,
        aggregator: RetrievalAggregator,
        context: ContextWindowBuilder,
        gateway: Arc<LlmGateway>,
        settings: SynthesisSettings,
    ) -> Self {
        Self {
            decomposer,
            aggregator,
            context,
            gateway,
            suggester: None,
            settings,
        }
    }

    /// Attach the collaborator consulted on no-results answers
    pub fn with_suggester(mut self, suggester: Arc<dyn TopicSuggester>) -> Self {
        self.suggester = Some(suggester);
        self
    }

    pub fn gateway(&self) -> &Arc<LlmGateway> {
        &self.gateway
    }

    /// Answer `question` from `collection_ids`.
    ///
    /// Always produces an [`Answer`]: provider failures degrade to partial or
    /// concatenated text, and a question nothing was found for yields the
    /// no-results answer without calling the model.
    pub async fn answer(&self, question: &str, collection_ids: &[String]) -> Answer {
        let deadline = Instant::now() + self.settings.query_deadline;
        let subs = self.decomposer.decompose(question);

        tracing::info!(
            "Answering '{}' ({} part(s), {} collection(s))",
            question,
            subs.len(),
            collection_ids.len()
        );

        let semaphore = Semaphore::new(self.settings.max_concurrent_subquestions.max(1));
        let units = subs.iter().map(|sub| {
            let semaphore = &semaphore;
            async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return unanswered(sub);
                };
                let unit_deadline = deadline.min(Instant::now() + self.settings.subquestion_timeout);

                match timeout_at(unit_deadline, self.answer_part(sub, collection_ids)).await {
                    Ok(part) => part,
                    Err(_) => {
                        tracing::warn!("Sub-question {} timed out: '{}'", sub.index + 1, sub.text);
                        unanswered(sub)
                    }
                }
            }
        });
        let parts: Vec<SubAnswer> = join_all(units).await;

        if !parts.iter().any(|p| p.had_results) {
            tracing::info!("No results for any part, routing to suggestions");
            let suggestions = self.suggestions(collection_ids, deadline).await;
            return Answer::no_results(NO_RESULTS, suggestions);
        }

        let mut citations = CitationSet::new();
        for part in &parts {
            citations.extend(part.citations.iter().cloned());
        }

        let text = if parts.len() == 1 {
            parts[0].text.clone()
        } else {
            self.synthesize(question, &parts, deadline).await
        };

        Answer {
            text,
            citations: citations.into_vec(),
            had_results: true,
            suggestions: Vec::new(),
            sub_answers: parts,
        }
    }

    /// Retrieval, context and generation for one sub-question
    async fn answer_part(&self, sub: &SubQuestion, collection_ids: &[String]) -> SubAnswer {
        let hits = match self
            .aggregator
            .search(
                &sub.text,
                collection_ids,
                self.settings.top_k,
                self.settings.similarity_threshold,
            )
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!("Retrieval failed for '{}': {}", sub.text, e);
                Vec::new()
            }
        };

        if hits.is_empty() {
            return unanswered(sub);
        }

        let windows = self.context.build(&hits).await;
        let citations = collect_citations(&hits);
        let prompt = PromptBuilder::answer_prompt(&sub.text, &windows, &citations);

        match self.gateway.generate(&prompt, self.settings.max_tokens_hint).await {
            Ok(text) => SubAnswer {
                question: sub.text.clone(),
                text,
                had_results: true,
                generation_failed: false,
                citations,
            },
            Err(e) => {
                tracing::warn!("Generation failed for '{}': {}", sub.text, e);
                SubAnswer {
                    question: sub.text.clone(),
                    text: PromptBuilder::generation_failed(&e.to_string()),
                    had_results: true,
                    generation_failed: true,
                    citations,
                }
            }
        }
    }

    /// One extra generation merging the partials, or their numbered concatenation
    async fn synthesize(&self, question: &str, parts: &[SubAnswer], deadline: Instant) -> String {
        let prompt = PromptBuilder::synthesis_prompt(question, parts);

        match timeout_at(deadline, self.gateway.generate(&prompt, self.settings.max_tokens_hint)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!("Synthesis failed ({}), concatenating partial answers", e);
                PromptBuilder::fallback_concatenation(parts)
            }
            Err(_) => {
                tracing::warn!("Query deadline reached before synthesis, concatenating partial answers");
                PromptBuilder::fallback_concatenation(parts)
            }
        }
    }

    async fn suggestions(&self, collection_ids: &[String], deadline: Instant) -> Vec<String> {
        let Some(suggester) = &self.suggester else {
            return Vec::new();
        };

        match timeout_at(deadline, suggester.suggest(collection_ids)).await {
            Ok(Ok(suggestions)) => suggestions,
            Ok(Err(e)) => {
                tracing::warn!("Topic suggestion failed: {}", e);
                Vec::new()
            }
            Err(_) => Vec::new(),
        }
    }
}

fn unanswered(sub: &SubQuestion) -> SubAnswer {
    SubAnswer {
        question: sub.text.clone(),
        text: NO_INFORMATION.to_string(),
        had_results: false,
        generation_failed: false,
        citations: Vec::new(),
    }
}
