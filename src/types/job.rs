//! Synthesis job types
//!
//! ## Job State Machine
//!
//! ```text
//! Planning → Discovering → GeneratingChapter(0) → … → Formatting → Complete
//!     └──────────────────────→ (themes supplied)
//! Failed / Cancelled: reachable from any non-terminal state
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Chapter, ChapterStatus, Language, Theme};

// =============================================================================
// Synthesis Level
// =============================================================================

/// Output length as a share of the source word count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisLevel {
    Short,
    #[default]
    Normal,
    Comprehensive,
}

impl SynthesisLevel {
    pub fn fraction(&self) -> f64 {
        match self {
            Self::Short => 0.15,
            Self::Normal => 0.30,
            Self::Comprehensive => 0.50,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Normal => "normal",
            Self::Comprehensive => "comprehensive",
        }
    }
}

impl fmt::Display for SynthesisLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SynthesisLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "normal" => Ok(Self::Normal),
            "comprehensive" => Ok(Self::Comprehensive),
            _ => Err(format!(
                "Invalid level '{}'. Valid: short, normal, comprehensive",
                s
            )),
        }
    }
}

// =============================================================================
// Job Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "chapter", rename_all = "snake_case")]
pub enum JobStatus {
    Planning,
    Discovering,
    GeneratingChapter(usize),
    Formatting,
    Complete,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Cancelled)
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;

        if self.is_terminal() {
            return false;
        }
        match (*self, next) {
            (_, Failed | Cancelled) => true,
            (Planning, Discovering | GeneratingChapter(0) | Formatting) => true,
            (Discovering, GeneratingChapter(0) | Formatting) => true,
            (GeneratingChapter(i), GeneratingChapter(j)) => j == i + 1,
            (GeneratingChapter(_), Formatting) => true,
            (Formatting, Complete) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Planning => write!(f, "planning"),
            Self::Discovering => write!(f, "discovering"),
            Self::GeneratingChapter(i) => write!(f, "generating chapter {}", i + 1),
            Self::Formatting => write!(f, "formatting"),
            Self::Complete => write!(f, "complete"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

// =============================================================================
// Synthesis Job
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisJob {
    pub id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Chapter order follows theme order
    pub themes: Vec<Theme>,
    pub level: SynthesisLevel,
    pub fragments_per_chapter: usize,
    pub language: Language,
    pub include_citations: bool,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl SynthesisJob {
    pub fn new(title: impl Into<String>, level: SynthesisLevel) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            author: None,
            themes: Vec::new(),
            level,
            fragments_per_chapter: crate::constants::synthesis::FRAGMENTS_PER_CHAPTER,
            language: Language::default(),
            include_citations: true,
            status: JobStatus::Planning,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Move to `next`; illegal transitions are logged and ignored.
    pub fn advance(&mut self, next: JobStatus) -> bool {
        if !self.status.can_transition_to(next) {
            tracing::warn!(job = %self.id, from = %self.status, to = %next, "Ignoring illegal job transition");
            return false;
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        true
    }
}

/// Metadata handed to output formatters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub language: Language,
    pub include_citations: bool,
    pub generated_at: DateTime<Utc>,
}

impl From<&SynthesisJob> for DocumentMetadata {
    fn from(job: &SynthesisJob) -> Self {
        Self {
            title: job.title.clone(),
            author: job.author.clone(),
            language: job.language,
            include_citations: job.include_citations,
            generated_at: job.finished_at.unwrap_or_else(Utc::now),
        }
    }
}

// =============================================================================
// Synthesis Result
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub job: SynthesisJob,
    pub chapters: Vec<Chapter>,
    pub source_words: usize,
    pub target_words: usize,
    /// Job-level failure after generation, e.g. from the output formatter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SynthesisResult {
    pub fn total_words(&self) -> usize {
        self.chapters.iter().map(|c| c.word_count).sum()
    }

    pub fn summary(&self) -> SynthesisSummary {
        let mut summary = SynthesisSummary {
            status: self.job.status,
            chapters: self.chapters.len(),
            total_words: self.total_words(),
            target_words: self.target_words,
            duration_secs: self
                .job
                .finished_at
                .map(|end| (end - self.job.started_at).num_milliseconds() as f64 / 1000.0),
            ..Default::default()
        };

        for chapter in &self.chapters {
            match chapter.status {
                ChapterStatus::Complete => summary.complete += 1,
                ChapterStatus::UnderTarget => summary.under_target += 1,
                ChapterStatus::Failed => summary.failed += 1,
                ChapterStatus::Cancelled => summary.cancelled += 1,
                ChapterStatus::Pending | ChapterStatus::InProgress => summary.pending += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisSummary {
    pub status: JobStatus,
    pub chapters: usize,
    pub complete: usize,
    pub under_target: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub pending: usize,
    pub total_words: usize,
    pub target_words: usize,
    pub duration_secs: Option<f64>,
}

impl Default for SynthesisSummary {
    fn default() -> Self {
        Self {
            status: JobStatus::Planning,
            chapters: 0,
            complete: 0,
            under_target: 0,
            failed: 0,
            cancelled: 0,
            pending: 0,
            total_words: 0,
            target_words: 0,
            duration_secs: None,
        }
    }
}

impl fmt::Display for SynthesisSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} chapters ({} complete, {} under target, {} failed, {} cancelled), {} / {} words",
            self.chapters,
            self.complete,
            self.under_target,
            self.failed,
            self.cancelled,
            self.total_words,
            self.target_words
        )?;
        if let Some(secs) = self.duration_secs {
            write!(f, " in {:.1}s", secs)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_fractions() {
        assert!((SynthesisLevel::Short.fraction() - 0.15).abs() < f64::EPSILON);
        assert!((SynthesisLevel::Normal.fraction() - 0.30).abs() < f64::EPSILON);
        assert!((SynthesisLevel::Comprehensive.fraction() - 0.50).abs() < f64::EPSILON);
        assert_eq!(
            "Comprehensive".parse::<SynthesisLevel>().unwrap(),
            SynthesisLevel::Comprehensive
        );
    }

    #[test]
    fn test_status_transitions() {
        use JobStatus::*;
        assert!(Planning.can_transition_to(Discovering));
        assert!(Discovering.can_transition_to(GeneratingChapter(0)));
        assert!(GeneratingChapter(0).can_transition_to(GeneratingChapter(1)));
        assert!(!GeneratingChapter(0).can_transition_to(GeneratingChapter(2)));
        assert!(GeneratingChapter(3).can_transition_to(Cancelled));
        assert!(Formatting.can_transition_to(Complete));
        assert!(!Complete.can_transition_to(Failed));
        assert!(!Planning.can_transition_to(Complete));
    }

    #[test]
    fn test_advance_sets_finished_at() {
        let mut job = SynthesisJob::new("Report", SynthesisLevel::Normal);
        assert!(job.advance(JobStatus::Discovering));
        assert!(job.finished_at.is_none());
        assert!(!job.advance(JobStatus::Complete));
        assert!(job.advance(JobStatus::Failed));
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&JobStatus::GeneratingChapter(2)).unwrap();
        assert_eq!(json, r#"{"state":"generating_chapter","chapter":2}"#);
        let back: JobStatus = serde_json::from_str(r#"{"state":"complete"}"#).unwrap();
        assert_eq!(back, JobStatus::Complete);
    }

    #[test]
    fn test_summary_counts() {
        let theme = Theme::new("t", "T", vec![]);
        let mut done = Chapter::new(0, &theme, 10);
        done.status = ChapterStatus::Complete;
        done.push_section("a b c".into());
        let mut failed = Chapter::new(1, &theme, 10);
        failed.fail("backend down");

        let result = SynthesisResult {
            job: SynthesisJob::new("R", SynthesisLevel::Short),
            chapters: vec![done, failed],
            source_words: 100,
            target_words: 15,
            error: None,
        };
        let summary = result.summary();
        assert_eq!(summary.complete, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total_words, 3);
        assert!(summary.to_string().starts_with("2 chapters"));
    }
}
