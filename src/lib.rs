//! SynthWeave - Theme Discovery and Multi-Chapter Synthesis
//!
//! Clusters an embedded document corpus into labeled themes, then writes one
//! chapter per theme with a local or OpenAI-compatible LLM, controlling
//! length and tracking citations back to source pages.
//!
//! ## Quick Start
//!
//! ```ignore
//! use synthweave::{Config, Orchestrator, SynthesisOptions, SynthesisRequest};
//! use synthweave::ai::{ProviderConfig, create_provider};
//! use synthweave::store::SqliteStore;
//!
//! let config = Config::default();
//! let provider = create_provider(&ProviderConfig::from(&config.llm))?;
//! let store = Arc::new(SqliteStore::open(&config.storage.database)?);
//!
//! let request = SynthesisRequest::new("Field Report", SynthesisOptions::from_config(&config));
//! let handle = Orchestrator::new(provider, store).start(request)?;
//! let result = handle.wait().await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: LLM backends, prompt construction, timeouts
//! - [`store`]: fragment store trait with in-memory and SQLite implementations
//! - [`synthesis`]: discovery, generation, length control, orchestration
//! - [`config`]: layered configuration

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod store;
pub mod synthesis;
pub mod types;

// Configuration
pub use config::{Config, ConfigLoader, LanguageSetting, LengthPolicy};

// Error Types
pub use types::error::{ErrorCategory, Result, ResultExt, SynthError};

// Domain Types
pub use types::{
    Chapter, ChapterStatus, Citation, EmbeddedFragment, Fragment, FragmentFilter, JobStatus,
    Language, SynthesisLevel, SynthesisResult, Theme, ThemeCount,
};

// Storage
pub use store::{FragmentStore, InMemoryStore, SharedStore, SqliteStore};

// AI
pub use ai::{LlmProvider, LlmResponse, SharedProvider, TimeoutConfig, create_provider, with_timeout};

// Synthesis
pub use synthesis::{
    CancelToken, JobHandle, Orchestrator, OutputFormatter, ProgressEvent, ProgressTracker,
    SynthesisOptions, SynthesisRequest, ThemeDiscovery,
};
