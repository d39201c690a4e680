//! Concurrent multi-collection search merged into one ranked list

use futures::future::join_all;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::error::Result;
use crate::providers::{Embedder, VectorStore};
use crate::types::{RankedHit, SearchHit};

/// Fans a query out to several collections and merges the hits
pub struct RetrievalAggregator {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    max_concurrent: usize,
    collection_timeout: Duration,
}

impl RetrievalAggregator {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        max_concurrent: usize,
        collection_timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            store,
            max_concurrent: max_concurrent.max(1),
            collection_timeout,
        }
    }

    /// Search every collection and return hits at or above `similarity_threshold`,
    /// best first.
    ///
    /// A collection that errors or times out contributes nothing. The only
    /// error is a failure to embed the query.
    pub async fn search(
        &self,
        query: &str,
        collection_ids: &[String],
        top_k: usize,
        similarity_threshold: f32,
    ) -> Result<Vec<RankedHit>> {
        let mut collections: Vec<&str> = Vec::with_capacity(collection_ids.len());
        for id in collection_ids {
            if !collections.contains(&id.as_str()) {
                collections.push(id);
            }
        }
        if collections.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed(query).await?;

        let semaphore = Semaphore::new(collections.len().min(self.max_concurrent));
        let searches = collections.iter().map(|collection_id| {
            let semaphore = &semaphore;
            let embedding = &embedding;

            async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return Vec::new();
                };

                match timeout(
                    self.collection_timeout,
                    self.store.search(collection_id, embedding, top_k),
                )
                .await
                {
                    Ok(Ok(mut hits)) => {
                        hits.truncate(top_k);
                        tracing::debug!("Collection '{}' returned {} hits", collection_id, hits.len());
                        hits
                    }
                    Ok(Err(e)) => {
                        tracing::warn!("Collection '{}' unavailable: {}", collection_id, e);
                        Vec::new()
                    }
                    Err(_) => {
                        tracing::warn!(
                            "Collection '{}' timed out after {:?}",
                            collection_id,
                            self.collection_timeout
                        );
                        Vec::new()
                    }
                }
            }
        });

        let results = join_all(searches).await;
        let ranked = merge_hits(results.into_iter().flatten(), similarity_threshold);

        tracing::info!(
            "Retrieved {} hits above {:.2} from {} collection(s)",
            ranked.len(),
            similarity_threshold,
            collections.len()
        );
        Ok(ranked)
    }
}

/// Ordering of the merged list: similarity descending, then collection id,
/// then rank within the collection
pub fn compare_ranked(a: &RankedHit, b: &RankedHit) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then_with(|| a.collection_id().cmp(b.collection_id()))
        .then_with(|| a.hit.rank.cmp(&b.hit.rank))
}

/// Rank, threshold and sort raw hits from any number of collections
pub fn merge_hits<I>(hits: I, similarity_threshold: f32) -> Vec<RankedHit>
where
    I: IntoIterator<Item = SearchHit>,
{
    let mut ranked: Vec<RankedHit> = hits
        .into_iter()
        .filter_map(RankedHit::from_hit)
        .filter(|hit| hit.similarity >= similarity_threshold)
        .collect();
    ranked.sort_by(compare_ranked);
    ranked
}
