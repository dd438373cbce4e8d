//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (platform config dir, e.g. ~/.config/synthweave/config.toml)
//! 3. Project config (.synthweave/config.toml)
//! 4. Environment variables (SYNTHWEAVE_* prefix, `__` between sections)

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{Result, SynthError};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // SYNTHWEAVE_LLM__MODEL -> llm.model, SYNTHWEAVE_SYNTHESIS__BATCH_COUNT -> synthesis.batch_count
        figment = figment.merge(Self::env_provider());

        let config: Config = figment
            .extract()
            .map_err(|e| SynthError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| SynthError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    fn env_provider() -> Env {
        Env::prefixed("SYNTHWEAVE_").split("__").lowercase(true)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory
    pub fn global_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "synthweave").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    /// Get project data directory
    pub fn project_dir() -> PathBuf {
        PathBuf::from(".synthweave")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());
    }

    /// Render the effective configuration as TOML or JSON
    pub fn render(config: &Config, as_json: bool) -> Result<String> {
        if as_json {
            Ok(serde_json::to_string_pretty(config)?)
        } else {
            toml::to_string_pretty(config).map_err(|e| SynthError::Config(e.to_string()))
        }
    }

    /// Show current effective configuration
    pub fn show_config(as_json: bool) -> Result<()> {
        let config = Self::load()?;
        println!("{}", Self::render(&config, as_json)?);
        Ok(())
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            SynthError::Config("Cannot determine global config directory".to_string())
        })?;

        fs::create_dir_all(&global_dir)?;

        let config_path = global_dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_global_config())?;
            info!("Created global config: {}", config_path.display());
        } else {
            info!("Global config exists: {}", config_path.display());
        }

        Ok(config_path)
    }

    /// Initialize project configuration in `root`
    pub fn init_project(root: &Path) -> Result<PathBuf> {
        let project_dir = root.join(Self::project_dir());
        fs::create_dir_all(&project_dir)?;

        let config_path = project_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, Self::default_project_config())?;
            info!("Created project config: {}", config_path.display());
        }

        Ok(config_path)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    /// Default global config content (TOML)
    fn default_global_config() -> String {
        r#"# SynthWeave Global Configuration
# User-wide defaults. Project settings in .synthweave/config.toml override these.

version = "1.0"

# LLM backend (ollama or openai-compatible)
[llm]
provider = "ollama"
model = "llama3.1:8b"
timeout_secs = 300
max_tokens = 4096

[language]
output = "auto"
fallback = "en"
"#
        .to_string()
    }

    /// Default project config content (TOML)
    fn default_project_config() -> String {
        r#"# SynthWeave Project Configuration
# Project-specific settings that override global defaults.

version = "1.0"

[discovery]
theme_count = "auto"
seed = 42

[synthesis]
level = "normal"
fragments_per_chapter = 40
length_policy = "weighted"
include_citations = true

[storage]
database = ".synthweave/fragments.db"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SynthesisLevel, ThemeCount};
    use figment::Jail;

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[discovery]\ntheme_count = 6\n[synthesis]\nlevel = \"short\"\n",
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.discovery.theme_count, ThemeCount::Exact(6));
        assert_eq!(config.synthesis.level, SynthesisLevel::Short);
        assert_eq!(config.synthesis.batch_count, 3);
    }

    #[test]
    fn test_load_from_file_validates() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[llm]\ntemperature = 5.0\n").unwrap();

        assert!(matches!(
            ConfigLoader::load_from_file(&path),
            Err(SynthError::Config(_))
        ));
    }

    #[test]
    fn test_default_templates_parse() {
        let dir = tempfile::TempDir::new().unwrap();
        for (name, content) in [
            ("global.toml", ConfigLoader::default_global_config()),
            ("project.toml", ConfigLoader::default_project_config()),
        ] {
            let path = dir.path().join(name);
            fs::write(&path, content).unwrap();
            assert!(ConfigLoader::load_from_file(&path).is_ok(), "{}", name);
        }
    }

    #[test]
    fn test_init_project() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = ConfigLoader::init_project(dir.path()).unwrap();
        assert!(path.exists());
        assert!(path.ends_with(".synthweave/config.toml"));
    }

    #[test]
    fn test_env_override_nested_keys() {
        Jail::expect_with(|jail| {
            jail.set_env("SYNTHWEAVE_LLM__MODEL", "qwen2.5:14b");
            jail.set_env("SYNTHWEAVE_SYNTHESIS__BATCH_COUNT", "4");

            let config: Config = Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(ConfigLoader::env_provider())
                .extract()?;

            assert_eq!(config.llm.model, "qwen2.5:14b");
            assert_eq!(config.synthesis.batch_count, 4);
            Ok(())
        });
    }

    #[test]
    fn test_render_toml_and_json() {
        let config = Config::default();
        let toml = ConfigLoader::render(&config, false).unwrap();
        assert!(toml.contains("[synthesis]"));
        let json = ConfigLoader::render(&config, true).unwrap();
        assert!(json.contains("\"theme_count\": \"auto\""));
    }
}
