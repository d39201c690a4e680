//! cite-rag: cited question answering over document collections
//!
//! A question is split into sub-questions, each answered from the hits of
//! several vector collections with page-expanded context, and the partial
//! answers are merged into one response that cites `(source, page)`.
//! Generation goes through [`gateway::LlmGateway`], which walks a
//! model × credential matrix per provider and falls back across providers.

pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod generation;
pub mod providers;
pub mod query;
pub mod retrieval;
pub mod suggest;
pub mod types;

pub use config::RagConfig;
pub use engine::RagEngine;
pub use error::{Error, Result};
pub use gateway::{LlmGateway, TierStatus};
pub use generation::{AnswerSynthesizer, SynthesisSettings};
pub use query::QueryDecomposer;
pub use retrieval::{ContextWindowBuilder, RetrievalAggregator};
pub use suggest::{KeywordTopicSuggester, TopicSuggester};
pub use types::{Answer, Citation, Credential, SubAnswer};
