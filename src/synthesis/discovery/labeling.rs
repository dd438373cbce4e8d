//! Theme labels from the LLM
//!
//! Models decorate titles with prefixes, quotes and markdown, or answer with
//! a whole paragraph. Parsing strips the decoration and rejects anything
//! that does not look like a title; rejected labels fall back to the
//! localized generic label.

use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::ai::{GenerationParams, SharedProvider, with_timeout};
use crate::constants::discovery as disc_constants;
use crate::synthesis::prompts::PromptTemplates;
use crate::types::{LabelFallbackReason, LabelResult, truncate_chars};

static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:#+\s*|[-*•]\s+|\d+[.)]\s+)").expect("valid list marker regex"));

static MARKDOWN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*|__|`|\*").expect("valid markdown regex"));

static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?;]\s+\S").expect("valid sentence regex"));

const QUOTES: &[char] = &['"', '\'', '“', '”', '„', '«', '»', '‘', '’', '‹', '›'];
const TRAILING: &[char] = &['.', ':', ';', ',', ' '];

fn strip_prefixes<'a>(mut text: &'a str, prefixes: &[&str]) -> &'a str {
    loop {
        let stripped = prefixes.iter().find_map(|p| {
            text.get(..p.len())
                .filter(|head| head.to_lowercase() == *p)
                .map(|_| text[p.len()..].trim_start())
        });
        match stripped {
            Some(rest) => text = rest,
            None => return text,
        }
    }
}

/// Clean a raw model reply into a label, or say why it is unusable
pub fn parse_label(raw: &str, templates: &PromptTemplates, max_words: usize, max_chars: usize) -> LabelResult {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let unmarked = LIST_MARKER.replace(&collapsed, "");
    let plain = MARKDOWN.replace_all(&unmarked, "");

    let text = strip_prefixes(plain.trim(), templates.label_prefixes).trim_matches(QUOTES);
    let sentence_like = SENTENCE_BREAK.is_match(text);
    let label = text.trim_end_matches(TRAILING).trim_matches(QUOTES).trim();

    if label.is_empty() {
        return LabelResult::Fallback(LabelFallbackReason::Empty);
    }
    if label.split_whitespace().count() > max_words || label.chars().count() > max_chars {
        return LabelResult::Fallback(LabelFallbackReason::TooLong);
    }
    if sentence_like {
        return LabelResult::Fallback(LabelFallbackReason::Sentence);
    }

    LabelResult::Ok(label.to_string())
}

/// Asks the backend for one theme label per call
pub struct ThemeLabeler {
    provider: SharedProvider,
    templates: &'static PromptTemplates,
    max_words: usize,
    max_chars: usize,
    timeout: Duration,
    temperature: f32,
}

impl ThemeLabeler {
    pub fn new(
        provider: SharedProvider,
        templates: &'static PromptTemplates,
        max_words: usize,
        max_chars: usize,
        timeout: Duration,
        temperature: f32,
    ) -> Self {
        Self {
            provider,
            templates,
            max_words,
            max_chars,
            timeout,
            temperature,
        }
    }

    /// Label for the excerpts closest to a cluster centroid
    pub async fn label(&self, excerpts: &[&str]) -> LabelResult {
        let excerpts: Vec<&str> = excerpts
            .iter()
            .map(|e| truncate_chars(e, disc_constants::LABEL_EXCERPT_CHARS))
            .collect();
        let prompt = self.templates.label_prompt(&excerpts, self.max_words);
        let params = GenerationParams::new(disc_constants::LABEL_MAX_TOKENS, self.temperature);

        let reply = with_timeout(
            self.timeout,
            self.provider.generate(&prompt, &params),
            "theme label",
        )
        .await;

        match reply {
            Ok(response) => {
                let result = parse_label(&response.content, self.templates, self.max_words, self.max_chars);
                debug!(raw = %truncate_chars(&response.content, 120), ?result, "Parsed theme label");
                result
            }
            Err(e) => LabelResult::Fallback(LabelFallbackReason::Backend(e.to_string())),
        }
    }

    /// Final label text for the theme at 1-based `position`, and whether it
    /// is the fallback
    pub fn resolve(&self, result: LabelResult, position: usize) -> (String, bool) {
        match result {
            LabelResult::Ok(label) => (label, false),
            LabelResult::Fallback(reason) => {
                let generic = self.templates.generic_label(position);
                warn!(position, reason = %reason, label = %generic, "Theme label fell back to generic");
                (generic, true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::mock::{MockProvider, lorem};
    use crate::synthesis::prompts::templates;
    use crate::types::{Language, SynthError};
    use std::sync::Arc;

    fn en() -> &'static PromptTemplates {
        templates(Language::English)
    }

    fn parse(raw: &str) -> LabelResult {
        parse_label(raw, en(), 8, 80)
    }

    #[test]
    fn test_clean_label_passes() {
        assert_eq!(parse("Soil Health"), LabelResult::Ok("Soil Health".into()));
    }

    #[test]
    fn test_decoration_stripped() {
        assert_eq!(parse("**Title: \"Soil Health\".**"), LabelResult::Ok("Soil Health".into()));
        assert_eq!(parse("# Theme: Water Rights"), LabelResult::Ok("Water Rights".into()));
        assert_eq!(parse("  - `Crop Rotation`\n"), LabelResult::Ok("Crop Rotation".into()));
        assert_eq!(parse("«Urban Planning»"), LabelResult::Ok("Urban Planning".into()));
    }

    #[test]
    fn test_localized_prefix_stripped() {
        let result = parse_label("Thema: Bodengesundheit", templates(Language::German), 8, 80);
        assert_eq!(result, LabelResult::Ok("Bodengesundheit".into()));
    }

    #[test]
    fn test_rejections() {
        assert_eq!(parse("  \"\" "), LabelResult::Fallback(LabelFallbackReason::Empty));
        assert_eq!(parse(&lorem(500)), LabelResult::Fallback(LabelFallbackReason::TooLong));
        assert_eq!(
            parse_label(&"x".repeat(30), en(), 8, 20),
            LabelResult::Fallback(LabelFallbackReason::TooLong)
        );
        assert_eq!(
            parse("Soil matters. It is key."),
            LabelResult::Fallback(LabelFallbackReason::Sentence)
        );
    }

    fn labeler(provider: MockProvider) -> ThemeLabeler {
        ThemeLabeler::new(Arc::new(provider), en(), 8, 80, Duration::from_secs(5), 0.3)
    }

    #[tokio::test]
    async fn test_long_reply_resolves_to_generic() {
        let labeler = labeler(MockProvider::words(500));
        let result = labeler.label(&["some excerpt"]).await;
        assert!(result.is_fallback());
        assert_eq!(labeler.resolve(result, 3), ("Theme 3".to_string(), true));
    }

    #[tokio::test]
    async fn test_backend_error_falls_back() {
        let labeler = labeler(MockProvider::new(|_, _| Err(SynthError::LlmApi("down".into()))));
        let result = labeler.label(&["excerpt"]).await;
        assert!(matches!(result, LabelResult::Fallback(LabelFallbackReason::Backend(_))));
    }

    #[tokio::test]
    async fn test_excerpts_truncated_and_tokens_capped() {
        let provider = Arc::new(MockProvider::fixed("Long Texts"));
        let labeler = ThemeLabeler::new(provider.clone(), en(), 8, 80, Duration::from_secs(5), 0.3);
        let long = "a".repeat(2000);
        assert_eq!(labeler.label(&[long.as_str()]).await, LabelResult::Ok("Long Texts".into()));

        let prompt = &provider.prompts()[0];
        assert!(!prompt.contains(&"a".repeat(disc_constants::LABEL_EXCERPT_CHARS + 1)));
        assert_eq!(provider.params()[0].max_tokens, disc_constants::LABEL_MAX_TOKENS);
    }
}
