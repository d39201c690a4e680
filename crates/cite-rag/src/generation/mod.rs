//! Answer generation: prompts, citations and multi-part synthesis

pub mod citation;
pub mod prompt;
pub mod synthesizer;

pub use citation::{collect_citations, CitationSet};
pub use prompt::{PromptBuilder, NO_INFORMATION, NO_RESULTS};
pub use synthesizer::{AnswerSynthesizer, SynthesisSettings};
