//! Themes Command
//!
//! Discovers themes in the stored fragments and prints them as JSON. The
//! output can be edited and passed back to `synthweave synthesize --themes`.

use std::path::PathBuf;

use tokio::sync::broadcast::error::RecvError;

use crate::ai::TimeoutConfig;
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, fragment_filter};
use crate::config::LanguageSetting;
use crate::synthesis::{LanguageDetector, ProgressTracker, ThemeDiscovery};
use crate::types::{Result, Theme, ThemeCount};

pub struct ThemesOptions {
    pub count: Option<ThemeCount>,
    pub language: Option<LanguageSetting>,
    pub documents: Vec<String>,
    pub output: Option<PathBuf>,
}

pub async fn run(ctx: &CommandContext, options: ThemesOptions, output: &Output) -> Result<()> {
    let themes = discover(ctx, &options, output).await?;
    output.themes(&themes);

    let json = serde_json::to_string_pretty(&themes)?;
    match &options.output {
        Some(path) => {
            std::fs::write(path, json)?;
            output.success(&format!("Wrote {} themes to {}", themes.len(), path.display()));
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn discover(ctx: &CommandContext, options: &ThemesOptions, output: &Output) -> Result<Vec<Theme>> {
    let config = &ctx.config;
    let fragments = ctx
        .store
        .query_fragments(&fragment_filter(&options.documents))
        .await?;
    output.info(&format!("Loaded {} fragments", fragments.len()));

    let detection = LanguageDetector::new(&config.language)
        .resolve(options.language.unwrap_or(config.language.output), &fragments);
    output.info(&format!("Language: {}", detection.language));

    let progress = ProgressTracker::new();
    let mut events = progress.subscribe();
    let printer_output = *output;
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => printer_output.event(&event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let discovery = ThemeDiscovery::new(
        ctx.provider.clone(),
        config.discovery.clone(),
        &TimeoutConfig::from_secs(config.llm.timeout_secs),
        config.llm.temperature,
    )
    .with_progress(progress);

    let count = options.count.unwrap_or(config.discovery.theme_count);
    let themes = discovery.discover(&fragments, count, detection.language).await;

    // Closing the last sender ends the printer
    drop(discovery);
    let _ = printer.await;
    themes
}
