//! Citation tracking
//!
//! The generator records every batch it sends to the backend. Recording is
//! idempotent per fragment per chapter, so continuation rounds that reuse a
//! batch add nothing new.

use std::collections::{HashMap, HashSet};

use crate::types::{Citation, Fragment};

#[derive(Debug, Default)]
pub struct CitationTracker {
    chapters: HashMap<usize, Vec<Citation>>,
    seen: HashMap<usize, HashSet<String>>,
}

impl CitationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the fragments of one generation call; returns only new entries
    pub fn record<'a>(&mut self, chapter: usize, batch: impl IntoIterator<Item = &'a Fragment>) -> Vec<Citation> {
        let seen = self.seen.entry(chapter).or_default();
        let entries = self.chapters.entry(chapter).or_default();

        let mut created = Vec::new();
        for fragment in batch {
            if seen.insert(fragment.id.clone()) {
                let citation = Citation::from_fragment(chapter, fragment);
                entries.push(citation.clone());
                created.push(citation);
            }
        }
        created
    }

    /// Deduplicated citations of `chapter` in source order
    pub fn finalize(&self, chapter: usize) -> Vec<Citation> {
        let mut citations = self.chapters.get(&chapter).cloned().unwrap_or_default();
        citations.sort_by(|a, b| a.source_key().cmp(&b.source_key()));
        citations
    }

    pub fn count(&self, chapter: usize) -> usize {
        self.chapters.get(&chapter).map_or(0, Vec::len)
    }
}
