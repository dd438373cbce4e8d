//! Chapter and citation types

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Fragment, Theme, count_words};

/// Provenance of a chapter back to one source fragment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Citation {
    pub chapter: usize,
    pub fragment_id: String,
    pub document_id: String,
    pub page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl Citation {
    pub(crate) fn from_fragment(chapter: usize, fragment: &Fragment) -> Self {
        Self {
            chapter,
            fragment_id: fragment.id.clone(),
            document_id: fragment.document_id.clone(),
            page: fragment.page,
            offset: fragment.offset,
        }
    }

    /// Source order: document, page, offset, fragment id
    pub fn source_key(&self) -> (&str, u32, Option<u32>, &str) {
        (&self.document_id, self.page, self.offset, &self.fragment_id)
    }
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, p. {}", self.document_id, self.page)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterStatus {
    #[default]
    Pending,
    InProgress,
    Complete,
    /// Iteration cap reached below target
    UnderTarget,
    Failed,
    Cancelled,
}

impl ChapterStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Pending | Self::InProgress)
    }
}

impl fmt::Display for ChapterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::UnderTarget => "under_target",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// One generated chapter, built section by section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub index: usize,
    pub theme_id: String,
    pub title: String,
    pub sections: Vec<String>,
    pub word_count: usize,
    pub target_words: usize,
    pub iterations: usize,
    pub citations: Vec<Citation>,
    pub status: ChapterStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Chapter {
    pub fn new(index: usize, theme: &Theme, target_words: usize) -> Self {
        Self {
            index,
            theme_id: theme.id.clone(),
            title: theme.label.clone(),
            sections: Vec::new(),
            word_count: 0,
            target_words,
            iterations: 0,
            citations: Vec::new(),
            status: ChapterStatus::Pending,
            error: None,
        }
    }

    /// Append a section; returns the new cumulative word count
    pub fn push_section(&mut self, text: String) -> usize {
        self.word_count += count_words(&text);
        self.sections.push(text);
        self.word_count
    }

    pub fn text(&self) -> String {
        self.sections.join("\n\n")
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = ChapterStatus::Failed;
        self.error = Some(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_citation_display() {
        let frag = Fragment::new("f9", "Annual Report", 12, "text");
        let citation = Citation::from_fragment(0, &frag);
        assert_eq!(citation.to_string(), "Annual Report, p. 12");
    }

    #[test]
    fn test_push_section_accumulates() {
        let theme = Theme::new("t", "Soil", vec![]);
        let mut chapter = Chapter::new(0, &theme, 100);
        assert_eq!(chapter.push_section("one two three".into()), 3);
        assert_eq!(chapter.push_section("four five".into()), 5);
        assert_eq!(chapter.text(), "one two three\n\nfour five");
        assert_eq!(chapter.title, "Soil");
    }

    #[test]
    fn test_status_finished() {
        assert!(!ChapterStatus::Pending.is_finished());
        assert!(!ChapterStatus::InProgress.is_finished());
        assert!(ChapterStatus::UnderTarget.is_finished());
        assert!(ChapterStatus::Cancelled.is_finished());
    }
}
