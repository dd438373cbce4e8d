//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (platform config dir) and project (.synthweave/) level configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::{discovery, language, network, retry, synthesis};
use crate::types::{Language, Result, SynthError, SynthesisLevel, ThemeCount};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// LLM backend settings
    pub llm: LlmConfig,

    /// Theme discovery settings
    pub discovery: DiscoveryConfig,

    /// Chapter synthesis and length control
    pub synthesis: SynthesisConfig,

    /// Language detection and override
    pub language: LanguageConfig,

    /// Fragment store settings
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            discovery: DiscoveryConfig::default(),
            synthesis: SynthesisConfig::default(),
            language: LanguageConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `SynthError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        fn invalid(msg: impl Into<String>) -> Result<()> {
            Err(SynthError::Config(msg.into()))
        }

        // LLM
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return invalid(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            ));
        }
        if self.llm.timeout_secs == 0 {
            return invalid("LLM timeout_secs must be greater than 0");
        }
        if self.llm.max_tokens == 0 {
            return invalid("LLM max_tokens must be greater than 0");
        }
        if self.llm.retry_min_delay_ms > self.llm.retry_max_delay_secs * 1000 {
            return invalid("LLM retry_min_delay_ms must not exceed retry_max_delay_secs");
        }

        // Discovery
        let d = &self.discovery;
        if d.auto_min_themes < 2 {
            return invalid("discovery.auto_min_themes must be at least 2");
        }
        if d.auto_min_themes > d.auto_max_themes {
            return invalid(format!(
                "discovery.auto_min_themes ({}) exceeds auto_max_themes ({})",
                d.auto_min_themes, d.auto_max_themes
            ));
        }
        if d.max_iterations == 0 {
            return invalid("discovery.max_iterations must be greater than 0");
        }
        if !(d.outlier_z_score.is_finite() && d.outlier_z_score > 0.0) {
            return invalid("discovery.outlier_z_score must be a positive number");
        }
        if d.label_sample_size == 0 || d.label_max_words == 0 || d.label_max_chars == 0 {
            return invalid("discovery label limits must be greater than 0");
        }

        // Synthesis
        let s = &self.synthesis;
        if s.fragments_per_chapter == 0 {
            return invalid("synthesis.fragments_per_chapter must be greater than 0");
        }
        if s.batch_count == 0 {
            return invalid("synthesis.batch_count must be greater than 0");
        }
        if s.max_iterations == Some(0) {
            return invalid("synthesis.max_iterations must be greater than 0");
        }
        if !(s.completion_ceiling.is_finite() && s.completion_ceiling >= 1.0) {
            return invalid(format!(
                "synthesis.completion_ceiling must be at least 1.0, got {}",
                s.completion_ceiling
            ));
        }
        if s.min_chapter_words == 0 || s.min_chapter_words > s.max_chapter_words {
            return invalid(format!(
                "synthesis chapter bounds invalid: min {} / max {}",
                s.min_chapter_words, s.max_chapter_words
            ));
        }

        // Language
        if self.language.sample_size == 0 {
            return invalid("language.sample_size must be greater than 0");
        }

        Ok(())
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (ollama, openai)
    pub provider: String,

    /// Model name
    pub model: String,

    /// Backend base URL (provider default when unset)
    pub api_base: Option<String>,

    /// API key for OpenAI-compatible servers (never written back out)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Per-call timeout in seconds
    pub timeout_secs: u64,

    /// Temperature for generation (0.0 = deterministic)
    pub temperature: f32,

    /// Upper bound on output tokens per call
    pub max_tokens: usize,

    /// Retries per call on recoverable errors
    pub max_retries: usize,

    /// First backoff delay in milliseconds
    pub retry_min_delay_ms: u64,

    /// Longest backoff delay in seconds
    pub retry_max_delay_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "llama3.1:8b".to_string(),
            api_base: None,
            api_key: None,
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
            temperature: 0.7,
            max_tokens: 4096,
            max_retries: retry::DEFAULT_MAX_RETRIES,
            retry_min_delay_ms: retry::BASE_DELAY_MS,
            retry_max_delay_secs: retry::MAX_DELAY_SECS,
        }
    }
}

// =============================================================================
// Discovery Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Requested theme count: a number or "auto"
    pub theme_count: ThemeCount,

    /// Clustering seed
    pub seed: u64,

    /// k-means iteration bound
    pub max_iterations: usize,

    pub auto_min_themes: usize,
    pub auto_max_themes: usize,

    /// Outlier threshold in standard deviations above the mean centroid distance
    pub outlier_z_score: f32,

    pub label_sample_size: usize,
    pub label_max_words: usize,
    pub label_max_chars: usize,

    /// TF-IDF keywords per theme (0 disables)
    pub keyword_count: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            theme_count: ThemeCount::Auto,
            seed: discovery::DEFAULT_SEED,
            max_iterations: discovery::MAX_ITERATIONS,
            auto_min_themes: discovery::AUTO_MIN_THEMES,
            auto_max_themes: discovery::AUTO_MAX_THEMES,
            outlier_z_score: discovery::OUTLIER_Z_SCORE,
            label_sample_size: discovery::LABEL_SAMPLE_SIZE,
            label_max_words: discovery::LABEL_MAX_WORDS,
            label_max_chars: discovery::LABEL_MAX_CHARS,
            keyword_count: discovery::KEYWORD_COUNT,
        }
    }
}

// =============================================================================
// Synthesis Configuration
// =============================================================================

/// How the total word target is split across chapters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LengthPolicy {
    /// Proportional to theme importance
    #[default]
    Weighted,
    /// Same target for every chapter
    Equal,
}

impl fmt::Display for LengthPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LengthPolicy::Weighted => write!(f, "weighted"),
            LengthPolicy::Equal => write!(f, "equal"),
        }
    }
}

impl FromStr for LengthPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weighted" => Ok(LengthPolicy::Weighted),
            "equal" => Ok(LengthPolicy::Equal),
            _ => Err(format!(
                "Unknown length policy: {}. Valid values: weighted, equal",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub level: SynthesisLevel,

    /// Cap on fragments retrieved per chapter
    pub fragments_per_chapter: usize,

    /// Sequential fragment batches per chapter
    pub batch_count: usize,

    /// Extra continuation calls after the scheduled batches
    pub continuation_rounds: usize,

    /// Explicit per-chapter call cap (defaults to batches + continuation rounds)
    pub max_iterations: Option<usize>,

    /// Stop once a chapter reaches this multiple of its target
    pub completion_ceiling: f32,

    pub min_chapter_words: usize,
    pub max_chapter_words: usize,

    pub length_policy: LengthPolicy,

    pub include_citations: bool,

    /// Words of prior chapter text carried into continuation prompts
    pub prior_context_words: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            level: SynthesisLevel::Normal,
            fragments_per_chapter: synthesis::FRAGMENTS_PER_CHAPTER,
            batch_count: synthesis::BATCH_COUNT,
            continuation_rounds: synthesis::CONTINUATION_ROUNDS,
            max_iterations: None,
            completion_ceiling: synthesis::COMPLETION_CEILING,
            min_chapter_words: synthesis::MIN_CHAPTER_WORDS,
            max_chapter_words: synthesis::MAX_CHAPTER_WORDS,
            length_policy: LengthPolicy::Weighted,
            include_citations: true,
            prior_context_words: synthesis::PRIOR_CONTEXT_WORDS,
        }
    }
}

// =============================================================================
// Language Configuration
// =============================================================================

/// Output language selection: detect from the corpus or force one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LanguageSetting {
    #[default]
    Auto,
    Fixed(Language),
}

impl TryFrom<String> for LanguageSetting {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<LanguageSetting> for String {
    fn from(setting: LanguageSetting) -> Self {
        setting.to_string()
    }
}

impl fmt::Display for LanguageSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LanguageSetting::Auto => write!(f, "auto"),
            LanguageSetting::Fixed(lang) => write!(f, "{}", lang.code()),
        }
    }
}

impl FromStr for LanguageSetting {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            Ok(LanguageSetting::Auto)
        } else {
            s.parse().map(LanguageSetting::Fixed)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageConfig {
    /// "auto" or a language code
    pub output: LanguageSetting,

    /// Used when detection is inconclusive
    pub fallback: Language,

    /// Fragments sampled for detection
    pub sample_size: usize,

    /// Minimum stop-word hits to accept a detection
    pub min_score: usize,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            output: LanguageSetting::Auto,
            fallback: Language::English,
            sample_size: language::SAMPLE_SIZE,
            min_score: language::MIN_SCORE,
        }
    }
}

// =============================================================================
// Storage Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite fragment database
    pub database: PathBuf,

    /// Maximum pooled connections
    pub pool_size: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(".synthweave/fragments.db"),
            pool_size: 4,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
