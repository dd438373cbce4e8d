//! Fragment Store Abstraction
//!
//! The [`FragmentStore`] trait is the vector-store seam of the synthesis
//! core: fragment lookup by filter and cosine similarity search.
//!
//! | Implementation | Use |
//! |---|---|
//! | [`InMemoryStore`] | tests, embedding callers that already hold vectors |
//! | [`SqliteStore`] | on-disk corpus loaded by an upstream ingester |

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::{PoolConfig, SqliteStore};

use async_trait::async_trait;
use std::sync::Arc;

use crate::types::{EmbeddedFragment, FragmentFilter, Result, ScoredFragment};

/// Shared store handle
pub type SharedStore = Arc<dyn FragmentStore>;

/// Read access to embedded fragments
#[async_trait]
pub trait FragmentStore: Send + Sync {
    /// Fragments matching `filter`, in stable corpus order
    async fn query_fragments(&self, filter: &FragmentFilter) -> Result<Vec<EmbeddedFragment>>;

    /// Top `k` fragments by cosine similarity to `query`, best first
    async fn similarity(&self, query: &[f32], k: usize) -> Result<Vec<ScoredFragment>>;
}

// =============================================================================
// Vector Helpers
// =============================================================================

/// Encode a float vector as a little-endian BLOB
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a little-endian BLOB back into a float vector
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1, 1]`; 0.0 for empty, mismatched or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

/// Rank `candidates` against `query`, keeping the top `k`.
///
/// Ties resolve by fragment id so results are stable across stores.
pub(crate) fn rank_by_similarity<'a, I>(query: &[f32], candidates: I, k: usize) -> Vec<ScoredFragment>
where
    I: IntoIterator<Item = &'a EmbeddedFragment>,
{
    let mut scored: Vec<ScoredFragment> = candidates
        .into_iter()
        .filter(|ef| ef.embedding.len() == query.len())
        .map(|ef| ScoredFragment {
            fragment: ef.fragment.clone(),
            score: cosine_similarity(query, &ef.embedding),
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.fragment.id.cmp(&b.fragment.id))
    });
    scored.truncate(k);
    scored
}
