//! Source fragment types
//!
//! Fragments are pre-chunked and pre-embedded upstream; the synthesis core
//! only reads them.

use serde::{Deserialize, Serialize};

/// Immutable unit of source text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: String,
    pub document_id: String,
    pub page: u32,
    /// Character offset within the page, when the chunker recorded one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    pub text: String,
    /// Reference into the vector store
    pub embedding_id: String,
}

impl Fragment {
    pub fn new(
        id: impl Into<String>,
        document_id: impl Into<String>,
        page: u32,
        text: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            embedding_id: id.clone(),
            id,
            document_id: document_id.into(),
            page,
            offset: None,
            text: text.into(),
        }
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn word_count(&self) -> usize {
        super::count_words(&self.text)
    }
}

/// Fragment paired with its embedding vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedFragment {
    pub fragment: Fragment,
    pub embedding: Vec<f32>,
}

impl EmbeddedFragment {
    pub fn new(fragment: Fragment, embedding: Vec<f32>) -> Self {
        Self {
            fragment,
            embedding,
        }
    }

    pub fn id(&self) -> &str {
        &self.fragment.id
    }
}

/// Similarity search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredFragment {
    pub fragment: Fragment,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
}

/// Selection of fragments to pull from the store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FragmentFilter {
    /// Restrict to these documents (all documents when `None`)
    #[serde(default)]
    pub document_ids: Option<Vec<String>>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl FragmentFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn documents<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            document_ids: Some(ids.into_iter().map(Into::into).collect()),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, fragment: &Fragment) -> bool {
        match &self.document_ids {
            Some(ids) => ids.iter().any(|id| id == &fragment.document_id),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_defaults_embedding_id() {
        let frag = Fragment::new("f1", "doc", 3, "some words here");
        assert_eq!(frag.embedding_id, "f1");
        assert_eq!(frag.word_count(), 3);
        assert!(frag.offset.is_none());
    }

    #[test]
    fn test_filter_matches_documents() {
        let filter = FragmentFilter::documents(["a", "b"]);
        assert!(filter.matches(&Fragment::new("1", "a", 1, "x")));
        assert!(!filter.matches(&Fragment::new("2", "c", 1, "x")));
        assert!(FragmentFilter::all().matches(&Fragment::new("3", "z", 1, "x")));
    }
}
