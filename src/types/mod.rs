pub mod chapter;
pub mod error;
pub mod fragment;
pub mod job;
pub mod language;
pub mod theme;
pub mod utils;

pub use chapter::{Chapter, ChapterStatus, Citation};
pub use error::{ErrorCategory, ErrorClassifier, LlmError, Result, ResultExt, SynthError};
pub use fragment::{EmbeddedFragment, Fragment, FragmentFilter, ScoredFragment};
pub use job::{
    DocumentMetadata, JobStatus, SynthesisJob, SynthesisLevel, SynthesisResult, SynthesisSummary,
};
pub use language::Language;
pub use theme::{LabelFallbackReason, LabelResult, Theme, ThemeCount};
pub use utils::{count_words, log_filter_warn, tail_words, trim_to_word_budget, truncate_chars};
