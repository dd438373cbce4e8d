//! Theme types
//!
//! A theme is a cluster of fragments that becomes one chapter. Themes are
//! value objects: editing operations return new themes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Discovered or externally edited topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub id: String,
    /// Member fragment ids, closest to the centroid first
    pub fragment_ids: Vec<String>,
    pub label: String,
    /// Share of the input fragments in this theme (0-1)
    pub importance: f32,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Label is the localized generic fallback
    #[serde(default)]
    pub label_fallback: bool,
}

impl Theme {
    pub fn new(id: impl Into<String>, label: impl Into<String>, fragment_ids: Vec<String>) -> Self {
        Self {
            id: id.into(),
            fragment_ids,
            label: label.into(),
            importance: 0.0,
            keywords: Vec::new(),
            label_fallback: false,
        }
    }

    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn member_count(&self) -> usize {
        self.fragment_ids.len()
    }

    pub fn contains(&self, fragment_id: &str) -> bool {
        self.fragment_ids.iter().any(|id| id == fragment_id)
    }

    /// Copy with a user-supplied label
    pub fn renamed(&self, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            label_fallback: false,
            ..self.clone()
        }
    }

    /// Combine two themes; `self` keeps its id and label.
    ///
    /// Importances add since both are shares of the same corpus.
    pub fn merge(&self, other: &Theme) -> Self {
        let mut fragment_ids = self.fragment_ids.clone();
        for id in &other.fragment_ids {
            if !fragment_ids.contains(id) {
                fragment_ids.push(id.clone());
            }
        }

        let mut keywords = self.keywords.clone();
        for kw in &other.keywords {
            if !keywords.contains(kw) {
                keywords.push(kw.clone());
            }
        }

        Self {
            id: self.id.clone(),
            fragment_ids,
            label: self.label.clone(),
            importance: (self.importance + other.importance).min(1.0),
            keywords,
            label_fallback: self.label_fallback,
        }
    }
}

// =============================================================================
// Theme Count
// =============================================================================

/// Requested number of themes: a fixed count or automatic selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "ThemeCountRepr", into = "ThemeCountRepr")]
pub enum ThemeCount {
    #[default]
    Auto,
    Exact(usize),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ThemeCountRepr {
    Count(usize),
    Keyword(String),
}

impl TryFrom<ThemeCountRepr> for ThemeCount {
    type Error = String;

    fn try_from(repr: ThemeCountRepr) -> Result<Self, Self::Error> {
        match repr {
            ThemeCountRepr::Count(n) => Ok(Self::Exact(n)),
            ThemeCountRepr::Keyword(s) => s.parse(),
        }
    }
}

impl From<ThemeCount> for ThemeCountRepr {
    fn from(count: ThemeCount) -> Self {
        match count {
            ThemeCount::Auto => Self::Keyword("auto".to_string()),
            ThemeCount::Exact(n) => Self::Count(n),
        }
    }
}

impl fmt::Display for ThemeCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Exact(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for ThemeCount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        s.parse::<usize>()
            .map(Self::Exact)
            .map_err(|_| format!("Invalid theme count '{}'. Use a number or 'auto'", s))
    }
}

// =============================================================================
// Label Result
// =============================================================================

/// Why a generated label was replaced by the generic one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum LabelFallbackReason {
    Empty,
    TooLong,
    Sentence,
    Backend(String),
}

impl fmt::Display for LabelFallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty response"),
            Self::TooLong => write!(f, "response too long"),
            Self::Sentence => write!(f, "response is a sentence"),
            Self::Backend(msg) => write!(f, "backend error: {}", msg),
        }
    }
}

/// Outcome of labeling one cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelResult {
    Ok(String),
    Fallback(LabelFallbackReason),
}

impl LabelResult {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}
