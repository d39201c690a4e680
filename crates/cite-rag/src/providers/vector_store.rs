//! Vector store and page-range collaborators

use async_trait::async_trait;
use crate::error::Result;
use crate::types::{PageChunk, SearchHit};

/// Nearest-neighbor search against one collection
///
/// Implementations:
/// - `MilvusClient`: Milvus v2 REST API
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Return at most `k` hits, closest first, with `rank` set to the
    /// position in that list
    async fn search(
        &self,
        collection_id: &str,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Fetch every stored chunk of `source` whose page is in `[page_min, page_max]`
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_pages(
        &self,
        collection_id: &str,
        source: &str,
        page_min: u32,
        page_max: u32,
    ) -> Result<Vec<PageChunk>>;
}

/// Pull raw chunk texts from a collection (input for topic suggestions)
#[async_trait]
pub trait CollectionSampler: Send + Sync {
    async fn sample_texts(&self, collection_id: &str, limit: usize) -> Result<Vec<String>>;
}
