//! Core types for the query engine

pub mod hit;
pub mod provider;
pub mod query;
pub mod response;

pub use hit::{similarity, PageChunk, RankedHit, SearchHit};
pub use provider::{Credential, ModelEndpoint, ProviderKind};
pub use query::SubQuestion;
pub use response::{Answer, Citation, SubAnswer};
