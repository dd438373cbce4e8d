use console::style;

use crate::synthesis::ProgressEvent;
use crate::types::{ChapterStatus, JobStatus, SynthesisResult, Theme};

/// Styled terminal output
///
/// Status lines go to stderr so stdout stays clean for JSON.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    quiet: bool,
}

impl Output {
    pub fn new() -> Self {
        Self { quiet: false }
    }

    pub fn quiet(quiet: bool) -> Self {
        Self { quiet }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {}", style("✓").green(), message);
        }
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        eprintln!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {}", style("ℹ").blue(), message);
        }
    }

    pub fn section(&self, message: &str) {
        if !self.quiet {
            eprintln!("\n{}", style(message).bold());
            eprintln!("{}", "─".repeat(40));
        }
    }

    /// One line per progress event
    pub fn event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Warning { .. } => self.warning(&event.to_string()),
            ProgressEvent::JobFinished { status, .. } => match status {
                JobStatus::Complete => self.success(&event.to_string()),
                JobStatus::Failed => self.error(&event.to_string()),
                _ => self.warning(&event.to_string()),
            },
            ProgressEvent::SectionGenerated { .. } | ProgressEvent::ThemeCountEvaluated { .. } => {
                if !self.quiet {
                    eprintln!("  {}", style(event.to_string()).dim());
                }
            }
            _ => self.info(&event.to_string()),
        }
    }

    pub fn themes(&self, themes: &[Theme]) {
        self.section(&format!("Themes ({})", themes.len()));
        for (i, theme) in themes.iter().enumerate() {
            let marker = if theme.label_fallback {
                style("*").yellow().to_string()
            } else {
                String::new()
            };
            self.info(&format!(
                "{}. {}{} [{} fragments, {:.0}%] {}",
                i + 1,
                theme.label,
                marker,
                theme.fragment_ids.len(),
                theme.importance * 100.0,
                style(theme.keywords.join(", ")).dim()
            ));
        }
    }

    pub fn result(&self, result: &SynthesisResult) {
        self.section(&result.job.title);
        for chapter in &result.chapters {
            let status = match chapter.status {
                ChapterStatus::Complete => style(chapter.status.to_string()).green(),
                ChapterStatus::UnderTarget => style(chapter.status.to_string()).yellow(),
                ChapterStatus::Failed => style(chapter.status.to_string()).red(),
                _ => style(chapter.status.to_string()).dim(),
            };
            self.info(&format!(
                "{}. {} ({} / {} words) {}",
                chapter.index + 1,
                chapter.title,
                chapter.word_count,
                chapter.target_words,
                status
            ));
        }

        let summary = result.summary();
        match summary.status {
            JobStatus::Complete => self.success(&summary.to_string()),
            JobStatus::Failed => {
                self.error(&summary.to_string());
                if let Some(error) = &result.error {
                    self.error(error);
                }
            }
            _ => self.warning(&summary.to_string()),
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
