//! CLI Common Utilities
//!
//! Shared initialization for command handlers: configuration, the fragment
//! store and the LLM backend.

use std::path::Path;
use std::sync::Arc;

use crate::ai::{ProviderConfig, SharedProvider, create_provider};
use crate::config::{Config, ConfigLoader};
use crate::store::{PoolConfig, SharedStore, SqliteStore};
use crate::types::{FragmentFilter, Result, SynthError};

/// Command execution context
#[derive(Clone)]
pub struct CommandContext {
    pub config: Config,
    pub store: SharedStore,
    pub provider: SharedProvider,
}

impl CommandContext {
    /// Load config (from `config_path` when given), open the store and build
    /// the provider
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = load_config(config_path)?;
        let store = open_store(&config)?;
        let provider = create_provider(&ProviderConfig::from(&config.llm))?;

        Ok(Self {
            config,
            store,
            provider,
        })
    }
}

/// Load the layered config, or a single file when `config_path` is given
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Open the configured fragment database; it must already exist
pub fn open_store(config: &Config) -> Result<SharedStore> {
    let path = &config.storage.database;
    if !path.exists() {
        return Err(SynthError::Storage(format!(
            "No fragment database at {}",
            path.display()
        )));
    }

    let store = SqliteStore::open_with_config(path, PoolConfig::with_max_size(config.storage.pool_size))?;
    Ok(Arc::new(store))
}

/// Build a fragment filter from `--document` arguments
pub fn fragment_filter(documents: &[String]) -> FragmentFilter {
    if documents.is_empty() {
        FragmentFilter::all()
    } else {
        FragmentFilter::documents(documents.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_store_requires_database() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.database = dir.path().join("missing.db");

        let err = open_store(&config).err().unwrap();
        assert!(matches!(err, SynthError::Storage(_)));
        assert!(!config.storage.database.exists());
    }

    #[test]
    fn test_open_store_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fragments.db");
        SqliteStore::open(&path).unwrap();

        let mut config = Config::default();
        config.storage.database = path;
        assert!(open_store(&config).is_ok());
    }

    #[test]
    fn test_fragment_filter() {
        assert!(fragment_filter(&[]).document_ids.is_none());
        let filter = fragment_filter(&["a.pdf".to_string()]);
        assert_eq!(filter.document_ids, Some(vec!["a.pdf".to_string()]));
    }
}
