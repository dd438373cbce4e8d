//! Config Command
//!
//! Usage:
//!   synthweave config show [-g] [-f json]
//!   synthweave config path
//!   synthweave config init [-g] [--force]

use std::path::Path;

use crate::cli::ui::Output;
use crate::cli::util::load_config;
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show the effective configuration, or the raw global file with `global`
pub fn show(config_path: Option<&Path>, global: bool, format: &str) -> Result<()> {
    let output = Output::new();

    if global {
        match ConfigLoader::global_config_path() {
            Some(path) if path.exists() => {
                println!("# Global Config: {}\n", path.display());
                println!("{}", std::fs::read_to_string(&path)?);
            }
            Some(_) => {
                output.warning("No global config found.");
                output.info("Run 'synthweave config init --global' to create one.");
            }
            None => output.error("Cannot determine global config directory."),
        }
        return Ok(());
    }

    let config = load_config(config_path)?;
    println!("{}", ConfigLoader::render(&config, format == "json")?);
    Ok(())
}

/// Show configuration paths
pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

/// Initialize global configuration
pub fn init_global(force: bool) -> Result<()> {
    let path = ConfigLoader::init_global(force)?;
    Output::new().success("Initialized global configuration");
    println!("  Config: {}", path.display());
    Ok(())
}

/// Initialize project configuration in the current directory
pub fn init_project() -> Result<()> {
    let root = std::env::current_dir()?;
    let path = ConfigLoader::init_project(&root)?;
    Output::new().success("Initialized project configuration");
    println!("  Config: {}", path.display());
    Ok(())
}
