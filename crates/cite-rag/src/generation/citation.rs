//! Citation collection with `(source, page)` deduplication

use std::collections::HashSet;

use crate::types::{Citation, RankedHit};

/// Insertion-ordered set of citations keyed by `(source, page)`.
///
/// The first citation seen for a key wins, including its collection id.
#[derive(Debug, Default, Clone)]
pub struct CitationSet {
    seen: HashSet<(String, u32)>,
    citations: Vec<Citation>,
}

impl CitationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a citation; returns false if its key was already present
    pub fn insert(&mut self, citation: Citation) -> bool {
        if self.seen.insert((citation.source.clone(), citation.page)) {
            self.citations.push(citation);
            true
        } else {
            false
        }
    }

    /// Add one citation per hit, in hit order
    pub fn extend_from_hits(&mut self, hits: &[RankedHit]) {
        for hit in hits {
            self.insert(Citation::from_hit(hit));
        }
    }

    pub fn len(&self) -> usize {
        self.citations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }

    pub fn as_slice(&self) -> &[Citation] {
        &self.citations
    }

    pub fn into_vec(self) -> Vec<Citation> {
        self.citations
    }
}

impl Extend<Citation> for CitationSet {
    fn extend<T: IntoIterator<Item = Citation>>(&mut self, iter: T) {
        for citation in iter {
            self.insert(citation);
        }
    }
}

/// Deduplicated citations for a ranked hit list
pub fn collect_citations(hits: &[RankedHit]) -> Vec<Citation> {
    let mut set = CitationSet::new();
    set.extend_from_hits(hits);
    set.into_vec()
}
