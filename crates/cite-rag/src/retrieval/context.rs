//! Page-range expansion of hits into per-source context windows

use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::providers::PageFetcher;
use crate::types::{PageChunk, RankedHit};

/// Page-contiguous context assembled around the hits of one source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextWindow {
    pub source: String,
    pub collection_id: String,
    /// Inclusive page range the window was built for
    pub page_range: (u32, u32),
    /// Chunk texts grouped by page, in page order
    pub pages: BTreeMap<u32, Vec<String>>,
    /// False when the window fell back to the raw hit texts
    pub expanded: bool,
}

impl ContextWindow {
    pub fn is_empty(&self) -> bool {
        self.pages.values().all(|texts| texts.is_empty())
    }

    /// Render as prompt text, one marker line per page
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (page, texts) in &self.pages {
            out.push_str(&format!("--- {}, Page {} ---\n", self.source, page));
            out.push_str(&texts.join("\n"));
            out.push_str("\n\n");
        }
        out
    }
}

/// `[min - before, max + after]` over the hit pages, clamped at page 1
pub fn expansion_range<I>(pages: I, margin_before: u32, margin_after: u32) -> Option<(u32, u32)>
where
    I: IntoIterator<Item = u32>,
{
    let mut iter = pages.into_iter();
    let first = iter.next()?;
    let (min, max) = iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
    Some((
        min.saturating_sub(margin_before).max(1),
        max.saturating_add(margin_after).max(1),
    ))
}

fn group_chunks(chunks: Vec<PageChunk>) -> BTreeMap<u32, Vec<String>> {
    let mut pages: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for chunk in chunks {
        pages.entry(chunk.page).or_default().push(chunk.text);
    }
    pages
}

/// Builds one [`ContextWindow`] per distinct source among the hits
pub struct ContextWindowBuilder {
    fetcher: Arc<dyn PageFetcher>,
    margin_before: u32,
    margin_after: u32,
    fetch_timeout: Duration,
}

impl ContextWindowBuilder {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        margin_before: u32,
        margin_after: u32,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            margin_before,
            margin_after,
            fetch_timeout,
        }
    }

    /// Windows in order of each source's first (best-ranked) hit.
    ///
    /// Sources are keyed by (collection id, source id). A window whose page
    /// fetch fails or comes back empty is built from the hit texts instead,
    /// so every window is non-empty.
    pub async fn build(&self, hits: &[RankedHit]) -> Vec<ContextWindow> {
        let mut groups: Vec<((&str, &str), Vec<&RankedHit>)> = Vec::new();
        for hit in hits {
            let key = (hit.collection_id(), hit.source());
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(hit),
                None => groups.push((key, vec![hit])),
            }
        }

        let windows = groups
            .into_iter()
            .map(|((collection_id, source), members)| self.build_one(collection_id, source, members));

        join_all(windows).await.into_iter().flatten().collect()
    }

    async fn build_one(
        &self,
        collection_id: &str,
        source: &str,
        hits: Vec<&RankedHit>,
    ) -> Option<ContextWindow> {
        let (page_min, page_max) = expansion_range(
            hits.iter().map(|h| h.page()),
            self.margin_before,
            self.margin_after,
        )?;

        tracing::debug!(
            "Expanding '{}' to pages {}..={}",
            source,
            page_min,
            page_max
        );

        let fetched = timeout(
            self.fetch_timeout,
            self.fetcher.fetch_pages(collection_id, source, page_min, page_max),
        )
        .await;

        let expanded = match fetched {
            Ok(Ok(chunks)) if !chunks.is_empty() => Some(group_chunks(chunks)),
            Ok(Ok(_)) => {
                tracing::warn!("No chunks for '{}' pages {}..={}, using hit texts", source, page_min, page_max);
                None
            }
            Ok(Err(e)) => {
                tracing::warn!("Context expansion failed for '{}': {}, using hit texts", source, e);
                None
            }
            Err(_) => {
                tracing::warn!("Context expansion timed out for '{}', using hit texts", source);
                None
            }
        };

        let window = match expanded {
            Some(pages) => ContextWindow {
                source: source.to_string(),
                collection_id: collection_id.to_string(),
                page_range: (page_min, page_max),
                pages,
                expanded: true,
            },
            None => ContextWindow {
                source: source.to_string(),
                collection_id: collection_id.to_string(),
                page_range: (page_min, page_max),
                pages: group_chunks(
                    hits.iter()
                        .map(|h| PageChunk {
                            page: h.page(),
                            text: h.hit.text.clone(),
                        })
                        .collect(),
                ),
                expanded: false,
            },
        };

        Some(window)
    }
}

/// Concatenate rendered windows into one prompt context block
pub fn render_windows(windows: &[ContextWindow]) -> String {
    windows
        .iter()
        .map(ContextWindow::render)
        .collect::<Vec<_>>()
        .join("")
}
