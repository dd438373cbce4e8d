//! Synthesize Command
//!
//! Runs one synthesis job, streams progress to stderr and writes the JSON
//! result to stdout or `--output`. Ctrl-C cancels the job cooperatively;
//! chapters written so far are kept.

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, fragment_filter};
use crate::config::LanguageSetting;
use crate::synthesis::{
    Orchestrator, OutputFormatter, ProgressEvent, SynthesisOptions, SynthesisRequest,
};
use crate::types::{
    Chapter, DocumentMetadata, Result, SynthError, SynthesisLevel, Theme, ThemeCount,
};

pub struct SynthesizeOptions {
    pub title: String,
    pub author: Option<String>,
    pub level: Option<SynthesisLevel>,
    pub count: Option<ThemeCount>,
    pub fragments_per_chapter: Option<usize>,
    pub language: Option<LanguageSetting>,
    pub no_citations: bool,
    pub documents: Vec<String>,
    /// JSON theme list from `synthweave themes`, used instead of discovery
    pub themes: Option<PathBuf>,
    /// Job result JSON (stdout when `None`)
    pub output: Option<PathBuf>,
    /// Finished document JSON
    pub document: Option<PathBuf>,
}

/// Formatter that writes the finished document as JSON
pub struct JsonDocumentWriter {
    path: PathBuf,
}

#[derive(Serialize)]
struct Document<'a> {
    metadata: &'a DocumentMetadata,
    chapters: &'a [Chapter],
}

impl JsonDocumentWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl OutputFormatter for JsonDocumentWriter {
    async fn format(&self, chapters: &[Chapter], metadata: &DocumentMetadata) -> Result<()> {
        let json = serde_json::to_string_pretty(&Document { metadata, chapters })?;
        tokio::fs::write(&self.path, json).await?;
        info!(path = %self.path.display(), chapters = chapters.len(), "Wrote document");
        Ok(())
    }
}

/// Read an edited theme list
pub fn load_themes(path: &Path) -> Result<Vec<Theme>> {
    let content = std::fs::read_to_string(path)?;
    let themes: Vec<Theme> = serde_json::from_str(&content)?;
    if themes.is_empty() {
        return Err(SynthError::Config(format!("No themes in {}", path.display())));
    }
    Ok(themes)
}

fn build_request(ctx: &CommandContext, options: &SynthesizeOptions) -> Result<SynthesisRequest> {
    let mut synthesis = SynthesisOptions::from_config(&ctx.config);
    if let Some(level) = options.level {
        synthesis.level = level;
    }
    if let Some(count) = options.count {
        synthesis.theme_count = count;
    }
    if let Some(n) = options.fragments_per_chapter {
        synthesis.fragments_per_chapter = n.max(1);
    }
    if let Some(language) = options.language {
        synthesis.language = language;
    }
    if options.no_citations {
        synthesis.include_citations = false;
    }

    let mut request = SynthesisRequest::new(&options.title, synthesis)
        .with_filter(fragment_filter(&options.documents));
    if let Some(author) = &options.author {
        request = request.with_author(author);
    }
    if let Some(path) = &options.themes {
        request = request.with_themes(load_themes(path)?);
    }
    Ok(request)
}

pub async fn run(ctx: &CommandContext, options: SynthesizeOptions, output: &Output) -> Result<()> {
    let request = build_request(ctx, &options)?;

    let mut orchestrator = Orchestrator::new(ctx.provider.clone(), ctx.store.clone());
    if let Some(path) = &options.document {
        orchestrator = orchestrator.with_formatter(Arc::new(JsonDocumentWriter::new(path)));
    }

    let mut handle = orchestrator.start(request)?;
    let mut events = handle.subscribe();
    let printer_output = *output;
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    printer_output.event(&event);
                    if matches!(event, ProgressEvent::JobFinished { .. }) {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let cancel = handle.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let result = handle.wait().await;
    interrupt.abort();
    drop(orchestrator);
    let _ = printer.await;
    let result = result?;

    output.result(&result);

    let json = serde_json::to_string_pretty(&result)?;
    match &options.output {
        Some(path) => {
            std::fs::write(path, json)?;
            output.success(&format!("Wrote result to {}", path.display()));
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Language;
    use chrono::Utc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_json_document_writer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        let writer = JsonDocumentWriter::new(&path);

        let theme = Theme::new("theme-1", "Soil", vec!["a".to_string()]);
        let mut chapter = Chapter::new(0, &theme, 500);
        chapter.sections.push("Soil holds water.".to_string());
        let metadata = DocumentMetadata {
            title: "Report".to_string(),
            author: None,
            language: Language::English,
            include_citations: true,
            generated_at: Utc::now(),
        };

        writer.format(&[chapter], &metadata).await.unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["metadata"]["title"], "Report");
        assert_eq!(value["chapters"][0]["title"], "Soil");
        assert_eq!(value["chapters"][0]["sections"][0], "Soil holds water.");
    }

    #[test]
    fn test_load_themes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("themes.json");
        let themes = vec![
            Theme::new("theme-1", "Soil", vec!["a".to_string()]).with_importance(0.6),
            Theme::new("theme-2", "Water", vec!["b".to_string()]).with_importance(0.4),
        ];
        std::fs::write(&path, serde_json::to_string(&themes).unwrap()).unwrap();

        let loaded = load_themes(&path).unwrap();
        assert_eq!(loaded, themes);
    }

    #[test]
    fn test_load_themes_rejects_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("themes.json");
        std::fs::write(&path, "[]").unwrap();

        assert!(matches!(load_themes(&path), Err(SynthError::Config(_))));
        assert!(matches!(
            load_themes(&dir.path().join("missing.json")),
            Err(SynthError::Io(_))
        ));
    }
}
