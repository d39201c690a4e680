//! Retrieval: multi-collection search and context window assembly

pub mod aggregator;
pub mod context;

pub use aggregator::{merge_hits, RetrievalAggregator};
pub use context::{expansion_range, render_windows, ContextWindow, ContextWindowBuilder};
