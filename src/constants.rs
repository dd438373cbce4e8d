//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Retry constants for LLM calls
pub mod retry {
    /// Default maximum retries per generation call
    pub const DEFAULT_MAX_RETRIES: usize = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 30;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f32 = 2.0;
}

/// Theme discovery constants
pub mod discovery {
    /// Default clustering seed (fixed for reproducible themes)
    pub const DEFAULT_SEED: u64 = 42;

    /// Maximum k-means iterations per run
    pub const MAX_ITERATIONS: usize = 100;

    /// Smallest theme count considered in auto mode
    pub const AUTO_MIN_THEMES: usize = 2;

    /// Largest theme count considered in auto mode
    pub const AUTO_MAX_THEMES: usize = 12;

    /// Fragments further than mean + z * stddev from their centroid are outliers
    pub const OUTLIER_Z_SCORE: f32 = 2.5;

    /// Representative fragments sent to the LLM for labeling
    pub const LABEL_SAMPLE_SIZE: usize = 5;

    /// Characters per representative excerpt in the label prompt
    pub const LABEL_EXCERPT_CHARS: usize = 400;

    /// Labels with more words than this are rejected
    pub const LABEL_MAX_WORDS: usize = 8;

    /// Labels with more characters than this are rejected
    pub const LABEL_MAX_CHARS: usize = 80;

    /// Output tokens requested for a label
    pub const LABEL_MAX_TOKENS: usize = 32;

    /// Keywords extracted per theme
    pub const KEYWORD_COUNT: usize = 5;
}

/// Chapter synthesis constants
pub mod synthesis {
    /// Default fragments per chapter
    pub const FRAGMENTS_PER_CHAPTER: usize = 40;

    /// Sequential fragment batches per chapter
    pub const BATCH_COUNT: usize = 3;

    /// Continuation rounds allowed after the scheduled batches
    pub const CONTINUATION_ROUNDS: usize = 2;

    /// Natural completion ceiling as a multiple of the chapter target
    pub const COMPLETION_CEILING: f32 = 1.2;

    /// Lower bound for any chapter target (words)
    pub const MIN_CHAPTER_WORDS: usize = 300;

    /// Upper bound for any chapter target (words)
    pub const MAX_CHAPTER_WORDS: usize = 12_000;

    /// Words of prior text carried into continuation prompts
    pub const PRIOR_CONTEXT_WORDS: usize = 150;

    /// Approximate tokens per generated word
    pub const TOKENS_PER_WORD: f32 = 1.4;
}

/// Language detection constants
pub mod language {
    /// Fragments sampled for detection
    pub const SAMPLE_SIZE: usize = 20;

    /// Minimum stop-word hits before a detection is trusted
    pub const MIN_SCORE: usize = 5;
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;
}

/// Progress channel constants
pub mod progress {
    /// Broadcast channel capacity
    pub const CHANNEL_CAPACITY: usize = 256;
}
