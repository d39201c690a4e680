//! Answer and citation types

use serde::{Deserialize, Serialize};

use super::hit::RankedHit;

/// Citation of a source page, deduplicated by `(source, page)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Source document id
    pub source: String,
    /// 1-based page number
    pub page: u32,
    /// Collection the page was retrieved from
    pub collection_id: String,
}

impl Citation {
    /// Create a citation from a retrieval hit
    pub fn from_hit(hit: &RankedHit) -> Self {
        Self {
            source: hit.source().to_string(),
            page: hit.page(),
            collection_id: hit.collection_id().to_string(),
        }
    }

    /// Deduplication key
    pub fn key(&self) -> (&str, u32) {
        (&self.source, self.page)
    }

    /// Format citation for display in text
    pub fn format_inline(&self) -> String {
        format!("[Source: {}, Page {}]", self.source, self.page)
    }
}

/// Partial answer for one sub-question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAnswer {
    pub question: String,
    pub text: String,
    pub had_results: bool,
    /// Retrieval succeeded but the model produced no text
    #[serde(default)]
    pub generation_failed: bool,
    pub citations: Vec<Citation>,
}

/// Terminal output of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Answer text (or the no-results notice)
    pub text: String,
    /// Cited pages, insertion-ordered, no duplicate `(source, page)`
    pub citations: Vec<Citation>,
    /// False when no sub-question retrieved anything
    pub had_results: bool,
    /// Suggested questions, filled only for no-results answers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    /// Per-sub-question breakdown
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_answers: Vec<SubAnswer>,
}

impl Answer {
    /// The explicit no-results outcome
    pub fn no_results(text: impl Into<String>, suggestions: Vec<String>) -> Self {
        Self {
            text: text.into(),
            citations: Vec::new(),
            had_results: false,
            suggestions,
            sub_answers: Vec::new(),
        }
    }

    pub fn is_no_results(&self) -> bool {
        !self.had_results
    }
}
