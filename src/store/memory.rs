//! In-memory [`FragmentStore`] implementation.
//!
//! Uses a `Vec` behind `std::sync::RwLock`. Similarity search is brute-force
//! cosine similarity over all stored vectors.

use async_trait::async_trait;
use std::sync::RwLock;

use super::{FragmentStore, rank_by_similarity};
use crate::types::{EmbeddedFragment, FragmentFilter, Result, ScoredFragment};

/// In-memory store, insertion ordered
#[derive(Default)]
pub struct InMemoryStore {
    fragments: RwLock<Vec<EmbeddedFragment>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fragments(fragments: Vec<EmbeddedFragment>) -> Self {
        Self {
            fragments: RwLock::new(fragments),
        }
    }

    /// Insert or replace by fragment id
    pub fn insert(&self, fragment: EmbeddedFragment) {
        let mut guard = self.fragments.write().unwrap_or_else(|p| p.into_inner());
        match guard.iter_mut().find(|f| f.id() == fragment.id()) {
            Some(existing) => *existing = fragment,
            None => guard.push(fragment),
        }
    }

    pub fn len(&self) -> usize {
        self.fragments
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl FragmentStore for InMemoryStore {
    async fn query_fragments(&self, filter: &FragmentFilter) -> Result<Vec<EmbeddedFragment>> {
        let guard = self.fragments.read().unwrap_or_else(|p| p.into_inner());
        let matching = guard.iter().filter(|ef| filter.matches(&ef.fragment));
        Ok(match filter.limit {
            Some(limit) => matching.take(limit).cloned().collect(),
            None => matching.cloned().collect(),
        })
    }

    async fn similarity(&self, query: &[f32], k: usize) -> Result<Vec<ScoredFragment>> {
        let guard = self.fragments.read().unwrap_or_else(|p| p.into_inner());
        Ok(rank_by_similarity(query, guard.iter(), k))
    }
}
