//! Topic suggestions for questions that found nothing

use async_trait::async_trait;
use parking_lot::RwLock;
use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::SuggestionConfig;
use crate::error::{Error, Result};
use crate::providers::CollectionSampler;

/// Produces example questions a user could ask about some collections
#[async_trait]
pub trait TopicSuggester: Send + Sync {
    async fn suggest(&self, collection_ids: &[String]) -> Result<Vec<String>>;
}

/// Returned when no collection yields any topic
pub const GENERIC_SUGGESTIONS: &[&str] = &[
    "Ask me about the content of the documents",
    "What would you like to learn about?",
    "I can help you find information in your PDFs",
];

const STOP_WORDS: &[&str] = &[
    // English
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "be", "been", "being", "have", "has", "had", "do",
    "does", "did", "will", "would", "could", "should", "may", "might", "must", "this", "that",
    "these", "those", "what", "which", "who", "when", "where", "why", "how", "can", "not", "no",
    "yes", "i", "you", "he", "she", "it", "we", "they", "me", "him", "her", "us", "them", "my",
    "your", "his", "its", "our", "their", "mine", "yours", "ours", "theirs", "am", "get", "got",
    "make", "made", "use", "used", "see", "seen", "know", "think", "take", "come", "give", "find",
    "tell", "ask", "work", "seem", "feel", "try", "leave", "call", "need", "become",
    // Vietnamese
    "là", "của", "và", "với", "trong", "được", "có", "này", "đó", "các", "để", "từ", "một",
    "không", "như", "về", "cho", "theo", "tôi", "bạn", "anh", "chị", "em", "chúng", "họ", "ta",
    "tóm", "tắt", "cần", "bản", "đề", "mục", "số", "ví", "dụ",
];

const IMPORTANT_KEYWORDS: &[&str] = &[
    "rouge", "bleu", "metric", "evaluation", "summarization", "nlp", "transformer", "bert", "gpt",
    "model", "training", "accuracy", "precision", "recall", "f1", "score", "dataset", "benchmark",
    "performance", "neural", "network", "vietnamese", "method", "approach", "algorithm",
    "technique", "framework", "experiment", "result", "conclusion", "introduction", "background",
    "literature", "review", "ngôn", "ngữ", "phân", "tích", "huấn", "luyện", "đánh", "giá", "dữ",
    "liệu", "phương", "pháp", "thuật", "toán", "nghiên", "cứu", "kết", "quả",
];

/// A frequent keyword or phrase with its suggested questions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Topic {
    pub keyword: String,
    pub score: usize,
    pub questions: Vec<String>,
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Question templates for a keyword; phrases lead with an explanation request
fn question_templates(keyword: &str) -> Vec<String> {
    let what = format!("What is {}?", capitalize(keyword));
    let explain = format!("Explain {}", keyword);
    let mut questions = if keyword.contains(' ') {
        vec![explain, what]
    } else {
        vec![what, explain]
    };
    questions.push(format!("What do the documents say about {}?", keyword));
    questions.push(format!("How does {} work?", keyword));
    questions.push(format!("What are the advantages and disadvantages of {}?", keyword));
    questions
}

/// Keyword-frequency suggester over sampled collection texts.
///
/// Topics are computed once per collection and cached until
/// [`KeywordTopicSuggester::clear_cache`].
pub struct KeywordTopicSuggester {
    sampler: Arc<dyn CollectionSampler>,
    config: SuggestionConfig,
    word: Regex,
    stop_words: HashSet<&'static str>,
    important: HashSet<&'static str>,
    cache: RwLock<HashMap<String, Vec<Topic>>>,
}

impl KeywordTopicSuggester {
    pub fn new(sampler: Arc<dyn CollectionSampler>, config: SuggestionConfig) -> Result<Self> {
        Ok(Self {
            sampler,
            config,
            word: Regex::new(r"\p{L}[\p{L}\p{N}]*")
                .map_err(|e| Error::internal(format!("word pattern: {}", e)))?,
            stop_words: STOP_WORDS.iter().copied().collect(),
            important: IMPORTANT_KEYWORDS.iter().copied().collect(),
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Rank unigrams and bigrams of `texts` and attach question templates
    pub fn extract_topics(&self, texts: &[String]) -> Vec<Topic> {
        let mut unigrams: HashMap<String, usize> = HashMap::new();
        let mut bigrams: HashMap<String, usize> = HashMap::new();

        for text in texts {
            let lower = text.to_lowercase();
            let words: Vec<&str> = self.word.find_iter(&lower).map(|m| m.as_str()).collect();
            for word in &words {
                *unigrams.entry((*word).to_string()).or_default() += 1;
            }
            for pair in words.windows(2) {
                *bigrams.entry(format!("{} {}", pair[0], pair[1])).or_default() += 1;
            }
        }

        let mut scored: Vec<(String, usize)> = Vec::new();

        for (word, count) in unigrams {
            if count < 2 || word.chars().count() < 4 || self.stop_words.contains(word.as_str()) {
                continue;
            }
            let boost = if self.important.contains(word.as_str()) { 3 } else { 1 };
            scored.push((word, count * boost));
        }

        for (phrase, count) in bigrams {
            if count < 2 {
                continue;
            }
            let words: Vec<&str> = phrase.split(' ').collect();
            let usable = words
                .iter()
                .all(|w| w.chars().count() >= 3 && !self.stop_words.contains(w));
            if !usable {
                continue;
            }
            let boost = if words.iter().any(|w| self.important.contains(w)) { 2 } else { 1 };
            scored.push((phrase, count * boost));
        }

        scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(self.config.max_topics);

        scored
            .into_iter()
            .map(|(keyword, score)| {
                let mut questions = question_templates(&keyword);
                questions.truncate(self.config.questions_per_topic);
                Topic {
                    keyword,
                    score,
                    questions,
                }
            })
            .collect()
    }

    /// Topics for one collection, sampled on first use
    pub async fn topics_for(&self, collection_id: &str) -> Result<Vec<Topic>> {
        let cached = self.cache.read().get(collection_id).cloned();
        if let Some(topics) = cached {
            return Ok(topics);
        }

        let texts: Vec<String> = self
            .sampler
            .sample_texts(collection_id, self.config.sample_size)
            .await?
            .into_iter()
            .filter(|t| !t.trim().is_empty())
            .collect();

        let topics = self.extract_topics(&texts);
        tracing::info!(
            "Extracted {} topics from '{}': {:?}",
            topics.len(),
            collection_id,
            topics.iter().map(|t| t.keyword.as_str()).collect::<Vec<_>>()
        );

        self.cache
            .write()
            .insert(collection_id.to_string(), topics.clone());
        Ok(topics)
    }

    pub fn has_topics(&self) -> bool {
        !self.cache.read().is_empty()
    }

    pub fn clear_cache(&self) {
        self.cache.write().clear();
        tracing::info!("Topic cache cleared");
    }
}

#[async_trait]
impl TopicSuggester for KeywordTopicSuggester {
    async fn suggest(&self, collection_ids: &[String]) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut suggestions = Vec::new();

        for collection_id in collection_ids {
            let topics = match self.topics_for(collection_id).await {
                Ok(topics) => topics,
                Err(e) => {
                    tracing::error!("Error building topics for '{}': {}", collection_id, e);
                    continue;
                }
            };

            for question in topics.into_iter().flat_map(|t| t.questions) {
                if seen.insert(question.clone()) {
                    suggestions.push(question);
                }
            }
        }

        if suggestions.is_empty() {
            tracing::warn!("No topics available, returning generic suggestions");
            return Ok(GENERIC_SUGGESTIONS.iter().map(|s| s.to_string()).collect());
        }

        suggestions.truncate(self.config.max_suggestions);
        Ok(suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSampler {
        texts: HashMap<String, Vec<String>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CollectionSampler for FakeSampler {
        async fn sample_texts(&self, collection_id: &str, limit: usize) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.texts.get(collection_id) {
                Some(texts) => Ok(texts.iter().take(limit).cloned().collect()),
                None => Err(Error::vector_store("collection not found")),
            }
        }
    }

    fn suggester(texts: Vec<(&str, Vec<&str>)>) -> (Arc<FakeSampler>, KeywordTopicSuggester) {
        let sampler = Arc::new(FakeSampler {
            texts: texts
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.into_iter().map(String::from).collect()))
                .collect(),
            calls: AtomicUsize::new(0),
        });
        let suggester =
            KeywordTopicSuggester::new(sampler.clone(), SuggestionConfig::default()).unwrap();
        (sampler, suggester)
    }

    fn corpus() -> Vec<&'static str> {
        vec![
            "ROUGE is a metric for evaluating summarization quality.",
            "The ROUGE metric compares summaries with references.",
            "Warranty coverage lasts two years. Warranty claims need receipts.",
            "Shipping is free.",
        ]
    }

    #[test]
    fn test_extract_topics_ranks_boosted_words() {
        let (_, s) = suggester(vec![]);
        let texts: Vec<String> = corpus().into_iter().map(String::from).collect();
        let topics = s.extract_topics(&texts);

        let keywords: Vec<&str> = topics.iter().map(|t| t.keyword.as_str()).collect();
        // rouge and metric: 2 occurrences, boosted x3; warranty: 2, not boosted
        assert_eq!(keywords, vec!["metric", "rouge", "warranty"]);
        assert_eq!(topics[0].score, 6);
        assert_eq!(topics[0].questions, vec!["What is Metric?", "Explain metric"]);
    }

    #[test]
    fn test_bigrams_need_two_occurrences() {
        let (_, s) = suggester(vec![]);
        let texts = vec![
            "neural network layers".to_string(),
            "a neural network learns".to_string(),
        ];
        let topics = s.extract_topics(&texts);
        let phrase = topics.iter().find(|t| t.keyword == "neural network").unwrap();
        assert_eq!(phrase.score, 4);
        assert_eq!(phrase.questions[0], "Explain neural network");
    }

    #[tokio::test]
    async fn test_suggestions_are_cached() {
        let (sampler, s) = suggester(vec![("docs", corpus())]);
        let ids = vec!["docs".to_string()];

        let first = s.suggest(&ids).await.unwrap();
        let second = s.suggest(&ids).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), SuggestionConfig::default().max_suggestions);
        assert_eq!(sampler.calls.load(Ordering::SeqCst), 1);

        s.clear_cache();
        assert!(!s.has_topics());
        s.suggest(&ids).await.unwrap();
        assert_eq!(sampler.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failing_collection_falls_back_to_generic() {
        let (_, s) = suggester(vec![]);
        let suggestions = s.suggest(&["missing".to_string()]).await.unwrap();
        assert_eq!(suggestions.len(), GENERIC_SUGGESTIONS.len());
    }
}
