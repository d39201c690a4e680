//! Retrieval hit types

use serde::{Deserialize, Serialize};

/// Raw nearest-neighbor hit as returned by the vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Collection the hit came from
    pub collection_id: String,
    /// Chunk text
    pub text: String,
    /// 1-based page number in the source document
    pub page: u32,
    /// Source document id (e.g. the PDF file name)
    pub source: String,
    /// Raw L2 distance (smaller is closer)
    pub distance: f32,
    /// Position of this hit in its collection's result list
    pub rank: usize,
}

/// Convert an L2 distance into a similarity in (0, 1].
///
/// Monotonic ranking heuristic, not a calibrated probability.
/// Negative distances are treated as 0.
pub fn similarity(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Search hit with its derived similarity; the aggregator's ordering key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedHit {
    #[serde(flatten)]
    pub hit: SearchHit,
    /// `1 / (1 + distance)`
    pub similarity: f32,
}

impl RankedHit {
    /// Rank a raw hit. Returns `None` when the distance is not a number.
    pub fn from_hit(hit: SearchHit) -> Option<Self> {
        if hit.distance.is_nan() {
            return None;
        }
        let similarity = similarity(hit.distance);
        Some(Self { hit, similarity })
    }

    pub fn source(&self) -> &str {
        &self.hit.source
    }

    pub fn page(&self) -> u32 {
        self.hit.page
    }

    pub fn collection_id(&self) -> &str {
        &self.hit.collection_id
    }
}

/// One stored chunk returned by a page-range fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageChunk {
    pub page: u32,
    pub text: String,
}
