//! Prompt templates for grounded answers and multi-part synthesis

use crate::retrieval::{render_windows, ContextWindow};
use crate::types::{Citation, SubAnswer};

/// Partial text for a sub-question that retrieved nothing
pub const NO_INFORMATION: &str = "No relevant information was found in the documents for this part.";

/// Answer text for the no-results outcome
pub const NO_RESULTS: &str =
    "Sorry, I could not find information related to your question in the selected documents.";

/// Prefix of the partial text when retrieval worked but generation did not
pub const GENERATION_FAILED: &str = "The language model could not produce an answer for this part";

/// Prompt builder for grounded generation
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the grounded answer prompt for one (sub-)question
    pub fn answer_prompt(question: &str, windows: &[ContextWindow], citations: &[Citation]) -> String {
        format!(
            r#"You are a document-grounded assistant that ONLY uses information from provided documents.

GROUNDING RULES:
1. ONLY use information that is EXPLICITLY stated in the CONTEXT below
2. If the answer is not in the context: respond with "This information is not available in the provided documents."
3. NEVER use external knowledge or training data
4. Cite every claim inline in this format: [Source: filename, Page X]
5. Stay close to the source text and answer concisely

CONTEXT FROM DOCUMENTS:
{context}
AVAILABLE SOURCES:
{sources}

QUESTION: {question}

Provide a grounded answer using ONLY the document content above:"#,
            context = render_windows(windows),
            sources = Self::format_sources_list(citations),
            question = question
        )
    }

    /// Build the prompt that merges partial answers into one response
    pub fn synthesis_prompt(question: &str, partials: &[SubAnswer]) -> String {
        let pairs = partials
            .iter()
            .map(|p| format!("Q: {}\nA: {}", p.question, p.text))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            r#"The question below was split into parts, and each part was answered from the documents.

ORIGINAL QUESTION: {question}

PARTIAL ANSWERS:
{pairs}

Combine the partial answers into one coherent answer to the original question.
- Use ONLY the information in the partial answers
- Keep every [Source: filename, Page X] citation attached to the claim it supports
- If a part could not be answered, say so briefly

Combined answer:"#,
            question = question,
            pairs = pairs
        )
    }

    /// Deterministic stand-in for a failed synthesis call
    pub fn fallback_concatenation(partials: &[SubAnswer]) -> String {
        partials
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{}. {}\n{}", i + 1, p.question, p.text.trim()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Partial text when generation failed after successful retrieval
    pub fn generation_failed(reason: &str) -> String {
        format!("{}: {}", GENERATION_FAILED, reason)
    }

    /// Numbered sources, each in the inline form the model must cite with
    fn format_sources_list(citations: &[Citation]) -> String {
        citations
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {}", i + 1, c.format_inline()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
