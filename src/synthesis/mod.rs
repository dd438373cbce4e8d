//! Theme discovery and chapter synthesis
//!
//! ```text
//! store ─► language ─► themes (given or discovered) ─► chapters ─► formatter
//!                                                        │
//!                                         generator + citation tracker
//! ```

pub mod citation;
pub mod discovery;
pub mod generator;
pub mod language;
pub mod length;
pub mod orchestrator;
pub mod progress;
pub mod prompts;

pub use citation::CitationTracker;
pub use discovery::ThemeDiscovery;
pub use generator::{ChapterGenerator, GeneratorSettings, SectionRequest};
pub use language::{Detection, LanguageDetector};
pub use orchestrator::{CancelToken, JobHandle, Orchestrator, OutputFormatter};
pub use progress::{ProgressEvent, ProgressState, ProgressTracker, Stage};

use crate::config::{Config, DiscoveryConfig, LanguageConfig, LanguageSetting, LengthPolicy};
use crate::types::{FragmentFilter, SynthesisLevel, Theme, ThemeCount};

/// Everything a job needs from configuration
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    pub level: SynthesisLevel,
    pub theme_count: ThemeCount,
    pub fragments_per_chapter: usize,
    pub batch_count: usize,
    /// Explicit per-chapter call cap; derived from the batches when unset
    pub max_iterations: Option<usize>,
    /// Calls allowed after the scheduled batches
    pub continuation_rounds: usize,
    pub completion_ceiling: f32,
    pub min_chapter_words: usize,
    pub max_chapter_words: usize,
    pub length_policy: LengthPolicy,
    pub include_citations: bool,
    pub language: LanguageSetting,
    pub language_detection: LanguageConfig,
    pub discovery: DiscoveryConfig,
    pub generator: GeneratorSettings,
}

impl SynthesisOptions {
    pub fn from_config(config: &Config) -> Self {
        let synthesis = &config.synthesis;
        Self {
            level: synthesis.level,
            theme_count: config.discovery.theme_count,
            fragments_per_chapter: synthesis.fragments_per_chapter,
            batch_count: synthesis.batch_count,
            max_iterations: synthesis.max_iterations,
            continuation_rounds: synthesis.continuation_rounds,
            completion_ceiling: synthesis.completion_ceiling,
            min_chapter_words: synthesis.min_chapter_words,
            max_chapter_words: synthesis.max_chapter_words,
            length_policy: synthesis.length_policy,
            include_citations: synthesis.include_citations,
            language: config.language.output,
            language_detection: config.language.clone(),
            discovery: config.discovery.clone(),
            generator: GeneratorSettings::from_config(config),
        }
    }

    /// Generation calls per chapter before it is finalized under target
    pub fn iteration_cap(&self, batches: usize) -> usize {
        self.max_iterations
            .unwrap_or(batches + self.continuation_rounds)
            .max(1)
    }
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// One synthesis job to run
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub title: String,
    pub author: Option<String>,
    pub filter: FragmentFilter,
    /// Externally edited themes; used unchanged instead of discovery
    pub themes: Option<Vec<Theme>>,
    pub options: SynthesisOptions,
}

impl SynthesisRequest {
    pub fn new(title: impl Into<String>, options: SynthesisOptions) -> Self {
        Self {
            title: title.into(),
            author: None,
            filter: FragmentFilter::all(),
            themes: None,
            options,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_filter(mut self, filter: FragmentFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_themes(mut self, themes: Vec<Theme>) -> Self {
        self.themes = Some(themes);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let mut config = Config::default();
        config.synthesis.max_iterations = Some(7);
        config.synthesis.level = SynthesisLevel::Short;
        let options = SynthesisOptions::from_config(&config);
        assert_eq!(options.iteration_cap(3), 7);
        assert_eq!(options.iteration_cap(1), 7);
        assert_eq!(options.level, SynthesisLevel::Short);
        assert_eq!(options.generator.max_tokens, config.llm.max_tokens);
    }

    #[test]
    fn test_default_iteration_cap() {
        let options = SynthesisOptions::default();
        assert_eq!(options.iteration_cap(options.batch_count), options.batch_count + 2);
        assert_eq!(options.iteration_cap(2), 4);
        assert_eq!(options.iteration_cap(0), 2);
    }
}
