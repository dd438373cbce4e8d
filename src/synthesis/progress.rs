//! Job progress streaming
//!
//! Events go out on a `tokio::sync::broadcast` channel; subscribers may lag
//! or be absent without affecting the job. A snapshot of the latest state is
//! kept alongside for callers that poll instead of subscribing.

use serde::Serialize;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::constants::progress as progress_constants;
use crate::types::{ChapterStatus, JobStatus, Language};

/// Coarse pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Idle,
    LoadingFragments,
    DetectingLanguage,
    Clustering,
    Labeling,
    Generating,
    Formatting,
    Finished,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::LoadingFragments => "loading fragments",
            Self::DetectingLanguage => "detecting language",
            Self::Clustering => "clustering",
            Self::Labeling => "labeling themes",
            Self::Generating => "generating chapters",
            Self::Formatting => "formatting",
            Self::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Progress event types
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    JobStarted {
        job_id: Uuid,
        title: String,
    },
    StageStarted {
        stage: Stage,
    },
    FragmentsLoaded {
        fragments: usize,
        source_words: usize,
    },
    LanguageResolved {
        language: Language,
        detected: bool,
    },
    /// One candidate of automatic theme-count selection
    ThemeCountEvaluated {
        k: usize,
        score: f32,
    },
    ClustersFormed {
        clusters: usize,
        outliers: usize,
    },
    ThemeLabeled {
        position: usize,
        total: usize,
        label: String,
        fallback: bool,
    },
    ChapterStarted {
        index: usize,
        total: usize,
        title: String,
        target_words: usize,
    },
    SectionGenerated {
        chapter: usize,
        iteration: usize,
        section_words: usize,
        chapter_words: usize,
        target_words: usize,
    },
    ChapterFinished {
        index: usize,
        status: ChapterStatus,
        words: usize,
    },
    Warning {
        message: String,
    },
    JobFinished {
        status: JobStatus,
        total_words: usize,
        duration_secs: u64,
    },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JobStarted { title, .. } => write!(f, "Started \"{}\"", title),
            Self::StageStarted { stage } => write!(f, "Stage: {}", stage),
            Self::FragmentsLoaded {
                fragments,
                source_words,
            } => write!(f, "Loaded {} fragments ({} words)", fragments, source_words),
            Self::LanguageResolved { language, detected } => {
                let how = if *detected { "detected" } else { "configured or fallback" };
                write!(f, "Language: {} ({})", language.name(), how)
            }
            Self::ThemeCountEvaluated { k, score } => write!(f, "k={} silhouette={:.3}", k, score),
            Self::ClustersFormed { clusters, outliers } => {
                write!(f, "{} clusters, {} outliers", clusters, outliers)
            }
            Self::ThemeLabeled {
                position,
                total,
                label,
                fallback,
            } => {
                let marker = if *fallback { " (fallback)" } else { "" };
                write!(f, "Theme {}/{}: {}{}", position, total, label, marker)
            }
            Self::ChapterStarted {
                index,
                total,
                title,
                target_words,
            } => write!(
                f,
                "Chapter {}/{}: {} (target {} words)",
                index + 1,
                total,
                title,
                target_words
            ),
            Self::SectionGenerated {
                chapter,
                iteration,
                chapter_words,
                target_words,
                ..
            } => write!(
                f,
                "  chapter {} section {}: {}/{} words",
                chapter + 1,
                iteration,
                chapter_words,
                target_words
            ),
            Self::ChapterFinished {
                index,
                status,
                words,
            } => write!(f, "Chapter {} {} with {} words", index + 1, status, words),
            Self::Warning { message } => write!(f, "Warning: {}", message),
            Self::JobFinished {
                status,
                total_words,
                duration_secs,
            } => write!(f, "Job {} with {} words in {}s", status, total_words, duration_secs),
        }
    }
}

/// Snapshot of the latest progress
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressState {
    pub stage: Stage,
    pub themes_labeled: usize,
    /// Zero-based chapter in progress
    pub chapter: Option<usize>,
    pub chapters_total: usize,
    pub chapter_words: usize,
    pub chapter_target: usize,
    /// Words across finished chapters
    pub total_words: usize,
    pub is_running: bool,
    pub elapsed_secs: u64,
}

/// Real-time progress tracker
#[derive(Clone)]
pub struct ProgressTracker {
    state: Arc<RwLock<ProgressState>>,
    sender: broadcast::Sender<ProgressEvent>,
    start_time: Arc<RwLock<Option<Instant>>>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(progress_constants::CHANNEL_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(ProgressState::default())),
            sender,
            start_time: Arc::new(RwLock::new(None)),
        }
    }

    /// Send an event; no receivers is normal operation.
    #[inline]
    fn emit(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }

    fn update(&self, f: impl FnOnce(&mut ProgressState)) {
        let mut state = self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut state);
        state.elapsed_secs = self.elapsed_secs();
    }

    fn elapsed_secs(&self) -> u64 {
        self.start_time
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(|s| s.elapsed().as_secs())
            .unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    pub fn state(&self) -> ProgressState {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn start(&self, job_id: Uuid, title: &str) {
        *self
            .start_time
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Instant::now());
        self.update(|s| {
            *s = ProgressState {
                is_running: true,
                ..Default::default()
            }
        });
        self.emit(ProgressEvent::JobStarted {
            job_id,
            title: title.to_string(),
        });
    }

    pub fn stage(&self, stage: Stage) {
        self.update(|s| s.stage = stage);
        self.emit(ProgressEvent::StageStarted { stage });
    }

    pub fn fragments_loaded(&self, fragments: usize, source_words: usize) {
        self.emit(ProgressEvent::FragmentsLoaded {
            fragments,
            source_words,
        });
    }

    pub fn language_resolved(&self, language: Language, detected: bool) {
        self.emit(ProgressEvent::LanguageResolved { language, detected });
    }

    pub fn theme_count_evaluated(&self, k: usize, score: f32) {
        self.emit(ProgressEvent::ThemeCountEvaluated { k, score });
    }

    pub fn clusters_formed(&self, clusters: usize, outliers: usize) {
        self.emit(ProgressEvent::ClustersFormed { clusters, outliers });
    }

    pub fn theme_labeled(&self, position: usize, total: usize, label: &str, fallback: bool) {
        self.update(|s| s.themes_labeled = position);
        self.emit(ProgressEvent::ThemeLabeled {
            position,
            total,
            label: label.to_string(),
            fallback,
        });
    }

    pub fn chapter_started(&self, index: usize, total: usize, title: &str, target_words: usize) {
        self.update(|s| {
            s.chapter = Some(index);
            s.chapters_total = total;
            s.chapter_words = 0;
            s.chapter_target = target_words;
        });
        self.emit(ProgressEvent::ChapterStarted {
            index,
            total,
            title: title.to_string(),
            target_words,
        });
    }

    pub fn section_generated(
        &self,
        chapter: usize,
        iteration: usize,
        section_words: usize,
        chapter_words: usize,
        target_words: usize,
    ) {
        self.update(|s| s.chapter_words = chapter_words);
        self.emit(ProgressEvent::SectionGenerated {
            chapter,
            iteration,
            section_words,
            chapter_words,
            target_words,
        });
    }

    pub fn chapter_finished(&self, index: usize, status: ChapterStatus, words: usize) {
        self.update(|s| s.total_words += words);
        self.emit(ProgressEvent::ChapterFinished {
            index,
            status,
            words,
        });
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.emit(ProgressEvent::Warning {
            message: message.into(),
        });
    }

    pub fn finish(&self, status: JobStatus, total_words: usize) {
        let duration_secs = self.elapsed_secs();
        self.update(|s| {
            s.stage = Stage::Finished;
            s.is_running = false;
            s.chapter = None;
        });
        self.emit(ProgressEvent::JobFinished {
            status,
            total_words,
            duration_secs,
        });
    }

    pub fn is_active(&self) -> bool {
        self.state().is_running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_creation() {
        let tracker = ProgressTracker::new();
        assert!(!tracker.is_active());
        assert_eq!(tracker.state().stage, Stage::Idle);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let tracker = ProgressTracker::new();
        tracker.start(Uuid::new_v4(), "t");
        tracker.stage(Stage::Clustering);
        assert!(tracker.is_active());
        assert_eq!(tracker.state().stage, Stage::Clustering);
    }

    #[tokio::test]
    async fn test_subscriber_sees_events_in_order() {
        let tracker = ProgressTracker::new();
        let mut rx = tracker.subscribe();

        tracker.chapter_started(0, 2, "Soil", 500);
        tracker.section_generated(0, 1, 200, 200, 500);
        tracker.chapter_finished(0, ChapterStatus::Complete, 520);

        assert!(matches!(rx.recv().await.unwrap(), ProgressEvent::ChapterStarted { index: 0, .. }));
        assert!(matches!(
            rx.recv().await.unwrap(),
            ProgressEvent::SectionGenerated { chapter_words: 200, .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            ProgressEvent::ChapterFinished { words: 520, .. }
        ));
    }

    #[test]
    fn test_snapshot_tracks_chapter() {
        let tracker = ProgressTracker::new();
        tracker.start(Uuid::new_v4(), "t");
        tracker.chapter_started(1, 3, "Water", 800);
        tracker.section_generated(1, 2, 300, 600, 800);

        let state = tracker.state();
        assert_eq!(state.chapter, Some(1));
        assert_eq!(state.chapter_words, 600);
        assert_eq!(state.chapter_target, 800);

        tracker.chapter_finished(1, ChapterStatus::Complete, 820);
        tracker.finish(JobStatus::Complete, 820);
        let state = tracker.state();
        assert_eq!(state.total_words, 820);
        assert!(!state.is_running);
    }

    #[test]
    fn test_event_serializes_tagged() {
        let json = serde_json::to_value(ProgressEvent::StageStarted {
            stage: Stage::Labeling,
        })
        .unwrap();
        assert_eq!(json["event"], "stage_started");
        assert_eq!(json["stage"], "labeling");
    }
}
