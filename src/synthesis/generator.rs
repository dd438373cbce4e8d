//! Chapter Generator
//!
//! Retrieval-augmented section writing: picks the fragments of a theme,
//! builds the localized section prompt for one batch and calls the backend
//! under a per-call timeout with exponential backoff on recoverable errors.

use backon::{ExponentialBuilder, Retryable};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::ai::{GenerationParams, SharedProvider, TimeoutConfig, with_timeout};
use crate::config::Config;
use crate::constants::{retry as retry_constants, synthesis as synth_constants};
use crate::store::SharedStore;
use crate::synthesis::citation::CitationTracker;
use crate::synthesis::discovery::kmeans::centroid;
use crate::synthesis::prompts::{PromptTemplates, SectionPrompt, templates};
use crate::types::{
    Citation, EmbeddedFragment, Fragment, Language, Result, SynthError, Theme, log_filter_warn,
    tail_words,
};

/// Call parameters shared by every section of a job
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    /// Upper bound for `max_tokens` of a single call
    pub max_tokens: usize,
    pub temperature: f32,
    pub timeouts: TimeoutConfig,
    pub max_retries: usize,
    pub retry_min_delay: Duration,
    pub retry_max_delay: Duration,
    /// Words of prior chapter text handed to continuations
    pub prior_context_words: usize,
}

impl GeneratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
            timeouts: TimeoutConfig::from_secs(config.llm.timeout_secs),
            max_retries: config.llm.max_retries,
            retry_min_delay: Duration::from_millis(config.llm.retry_min_delay_ms),
            retry_max_delay: Duration::from_secs(config.llm.retry_max_delay_secs),
            prior_context_words: config.synthesis.prior_context_words,
        }
    }

    /// Token budget for a section of `words` words
    pub fn max_tokens_for(&self, words: usize) -> usize {
        let estimate = (words as f32 * synth_constants::TOKENS_PER_WORD).ceil() as usize;
        estimate.clamp(1, self.max_tokens.max(1))
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.retry_min_delay)
            .with_max_delay(self.retry_max_delay)
            .with_factor(retry_constants::BACKOFF_FACTOR)
            .with_max_times(self.max_retries)
            .with_jitter()
    }
}

/// Backoff delay stretched to the backend's retry hint, capped at `max_delay`
fn retry_delay(error: &SynthError, planned: Option<Duration>, max_delay: Duration) -> Option<Duration> {
    let planned = planned?;
    Some(match error.retry_hint() {
        Some(hint) => hint.max(planned).min(max_delay.max(planned)),
        None => planned,
    })
}

/// One section to write
#[derive(Debug, Clone, Copy)]
pub struct SectionRequest<'a> {
    pub chapter: usize,
    pub document_title: &'a str,
    pub theme: &'a Theme,
    pub batch: &'a [Fragment],
    /// Chapter text so far; set for continuation sections
    pub prior_text: Option<&'a str>,
    pub requested_words: usize,
}

/// Split retrieved fragments into at most `batch_count` contiguous batches
pub fn split_batches(fragments: Vec<Fragment>, batch_count: usize) -> Vec<Vec<Fragment>> {
    if fragments.is_empty() {
        return Vec::new();
    }
    let size = fragments.len().div_ceil(batch_count.max(1));
    fragments.chunks(size).map(<[Fragment]>::to_vec).collect()
}

pub struct ChapterGenerator {
    provider: SharedProvider,
    store: SharedStore,
    settings: GeneratorSettings,
    templates: &'static PromptTemplates,
    citations: CitationTracker,
}

impl ChapterGenerator {
    pub fn new(
        provider: SharedProvider,
        store: SharedStore,
        settings: GeneratorSettings,
        language: Language,
    ) -> Self {
        Self {
            provider,
            store,
            settings,
            templates: templates(language),
            citations: CitationTracker::new(),
        }
    }

    /// Theme fragments closest to the theme centroid first, capped at `limit`.
    ///
    /// Members the store does not rank keep their theme order after the
    /// ranked ones. Ids missing from `corpus` are skipped.
    pub async fn retrieve(
        &self,
        theme: &Theme,
        corpus: &[EmbeddedFragment],
        limit: usize,
    ) -> Vec<Fragment> {
        let by_id: HashMap<&str, &EmbeddedFragment> = corpus.iter().map(|ef| (ef.id(), ef)).collect();

        let members: Vec<&EmbeddedFragment> = theme
            .fragment_ids
            .iter()
            .filter_map(|id| {
                let found = by_id.get(id.as_str()).copied();
                if found.is_none() {
                    warn!(theme = %theme.id, fragment = %id, "Theme references unknown fragment");
                }
                found
            })
            .collect();

        let member_ids: HashSet<&str> = members.iter().map(|ef| ef.id()).collect();
        let mut taken: HashSet<String> = HashSet::new();
        let mut ordered = Vec::with_capacity(members.len());

        if let Some(center) = centroid(members.iter().map(|ef| ef.embedding.as_slice())) {
            let ranked = log_filter_warn(
                with_timeout(
                    self.settings.timeouts.store_query,
                    self.store.similarity(&center, corpus.len()),
                    "similarity query",
                )
                .await,
                "Similarity ranking failed, using theme order",
            );

            for scored in ranked.into_iter().flatten() {
                if member_ids.contains(scored.fragment.id.as_str())
                    && taken.insert(scored.fragment.id.clone())
                {
                    ordered.push(scored.fragment);
                }
            }
        }

        for ef in members {
            if taken.insert(ef.id().to_string()) {
                ordered.push(ef.fragment.clone());
            }
        }

        ordered.truncate(limit);
        debug!(theme = %theme.id, retrieved = ordered.len(), limit, "Retrieved chapter fragments");
        ordered
    }

    /// Write one section; the batch is cited only when the call succeeds
    #[instrument(skip_all, fields(chapter = request.chapter, words = request.requested_words, sources = request.batch.len()))]
    pub async fn generate_section(&mut self, request: &SectionRequest<'_>) -> Result<String> {
        let prior_tail = request
            .prior_text
            .map(|text| tail_words(text, self.settings.prior_context_words));

        let prompt = self.templates.section_prompt(&SectionPrompt {
            document_title: request.document_title,
            chapter_title: &request.theme.label,
            keywords: &request.theme.keywords,
            sources: request.batch.iter().map(|f| f.text.as_str()).collect(),
            prior_tail: prior_tail.as_deref(),
            requested_words: request.requested_words,
        });
        let params = GenerationParams::new(
            self.settings.max_tokens_for(request.requested_words),
            self.settings.temperature,
        );

        let provider = self.provider.clone();
        let timeout = self.settings.timeouts.llm_request;
        let max_delay = self.settings.retry_max_delay;
        let chapter = request.chapter;

        let result = (|| async {
            with_timeout(timeout, provider.generate(&prompt, &params), "section generation").await
        })
        .retry(self.settings.backoff())
        .when(|e: &SynthError| e.is_recoverable())
        .adjust(move |e: &SynthError, planned| retry_delay(e, planned, max_delay))
        .notify(|e: &SynthError, delay: Duration| {
            warn!(
                chapter,
                error = %e,
                delay_ms = delay.as_millis() as u64,
                "Retrying section generation"
            );
        })
        .await;

        match result {
            Ok(response) => {
                let created = self.citations.record(chapter, request.batch);
                debug!(
                    chapter,
                    new_citations = created.len(),
                    output_tokens = response.usage.output_tokens,
                    "Section generated"
                );
                Ok(response.content.trim().to_string())
            }
            Err(e) => Err(SynthError::Generation {
                chapter,
                timed_out: matches!(e, SynthError::Timeout { .. }),
                reason: e.to_string(),
            }),
        }
    }

    /// Citations of a finished chapter, deduplicated and in source order
    pub fn finalize_citations(&self, chapter: usize) -> Vec<Citation> {
        self.citations.finalize(chapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::mock::{MockProvider, lorem};
    use crate::store::InMemoryStore;
    use crate::types::{ErrorCategory, LlmError};
    use std::sync::Arc;

    fn settings() -> GeneratorSettings {
        GeneratorSettings {
            max_tokens: 4096,
            temperature: 0.7,
            timeouts: TimeoutConfig::from_secs(5),
            max_retries: 2,
            retry_min_delay: Duration::from_millis(1),
            retry_max_delay: Duration::from_millis(5),
            prior_context_words: 5,
        }
    }

    fn corpus() -> Vec<EmbeddedFragment> {
        vec![
            EmbeddedFragment::new(Fragment::new("a", "d1", 1, "alpha text"), vec![1.0, 0.0]),
            EmbeddedFragment::new(Fragment::new("b", "d1", 2, "beta text"), vec![0.9, 0.1]),
            EmbeddedFragment::new(Fragment::new("c", "d2", 1, "gamma text"), vec![0.2, 1.0]),
            EmbeddedFragment::new(Fragment::new("d", "d2", 4, "delta text"), vec![0.0, 1.0]),
        ]
    }

    fn generator(provider: Arc<MockProvider>) -> ChapterGenerator {
        let store = Arc::new(InMemoryStore::with_fragments(corpus()));
        ChapterGenerator::new(provider, store, settings(), Language::English)
    }

    fn theme() -> Theme {
        Theme::new("t1", "Soil Health", vec!["a".into(), "b".into()])
            .with_keywords(vec!["soil".into()])
    }

    #[tokio::test]
    async fn test_section_records_citations() {
        let provider = Arc::new(MockProvider::words(120));
        let mut generator = generator(provider.clone());
        let theme = theme();
        let batch = vec![corpus()[0].fragment.clone()];

        let text = generator
            .generate_section(&SectionRequest {
                chapter: 0,
                document_title: "Doc",
                theme: &theme,
                batch: &batch,
                prior_text: None,
                requested_words: 100,
            })
            .await
            .unwrap();

        assert_eq!(text.split_whitespace().count(), 120);
        let citations = generator.finalize_citations(0);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].fragment_id, "a");
        assert_eq!(provider.params()[0].max_tokens, 140);
        assert!(provider.prompts()[0].contains("alpha text"));
    }

    #[tokio::test]
    async fn test_continuation_prompt_carries_tail() {
        let provider = Arc::new(MockProvider::fixed("more"));
        let mut generator = generator(provider.clone());
        let theme = theme();
        let batch = vec![corpus()[1].fragment.clone()];
        let prior = format!("{} closing sentence here now", lorem(50));

        generator
            .generate_section(&SectionRequest {
                chapter: 0,
                document_title: "Doc",
                theme: &theme,
                batch: &batch,
                prior_text: Some(&prior),
                requested_words: 80,
            })
            .await
            .unwrap();

        let prompt = &provider.prompts()[0];
        assert!(prompt.contains("closing sentence here now"));
        assert!(prompt.contains("Continue the chapter"));
    }

    #[tokio::test]
    async fn test_recovers_from_network_errors() {
        let provider = Arc::new(MockProvider::new(|call, _| {
            if call < 2 {
                Err(LlmError::new(ErrorCategory::Network, "connection reset").into())
            } else {
                Ok("recovered text".to_string())
            }
        }));
        let mut generator = generator(provider.clone());
        let theme = theme();
        let batch = vec![corpus()[0].fragment.clone()];

        let text = generator
            .generate_section(&SectionRequest {
                chapter: 1,
                document_title: "Doc",
                theme: &theme,
                batch: &batch,
                prior_text: None,
                requested_words: 100,
            })
            .await
            .unwrap();
        assert_eq!(text, "recovered text");
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_auth_error_not_retried() {
        let provider = Arc::new(MockProvider::new(|_, _| {
            Err(LlmError::new(ErrorCategory::Auth, "invalid key").into())
        }));
        let mut generator = generator(provider.clone());
        let theme = theme();
        let batch = vec![corpus()[0].fragment.clone()];

        let err = generator
            .generate_section(&SectionRequest {
                chapter: 2,
                document_title: "Doc",
                theme: &theme,
                batch: &batch,
                prior_text: None,
                requested_words: 100,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SynthError::Generation { chapter: 2, timed_out: false, .. }));
        assert_eq!(provider.call_count(), 1);
        assert!(generator.finalize_citations(2).is_empty());
    }

    #[tokio::test]
    async fn test_timeouts_exhaust_retries() {
        let provider = Arc::new(MockProvider::fixed("late").with_delay(Duration::from_millis(200)));
        let store = Arc::new(InMemoryStore::new());
        let mut settings = settings();
        settings.timeouts.llm_request = Duration::from_millis(20);
        settings.max_retries = 1;
        let mut generator = ChapterGenerator::new(provider.clone(), store, settings, Language::English);
        let theme = theme();
        let batch = vec![corpus()[0].fragment.clone()];

        let err = generator
            .generate_section(&SectionRequest {
                chapter: 0,
                document_title: "Doc",
                theme: &theme,
                batch: &batch,
                prior_text: None,
                requested_words: 100,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SynthError::Generation { timed_out: true, .. }));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_retrieve_ranks_members_and_caps() {
        let generator = generator(Arc::new(MockProvider::fixed("x")));
        let corpus = corpus();
        let theme = Theme::new("t", "T", vec!["d".into(), "c".into(), "a".into(), "zz".into()]);

        let all = generator.retrieve(&theme, &corpus, 10).await;
        let ids: Vec<&str> = all.iter().map(|f| f.id.as_str()).collect();
        // Centroid leans toward the second axis
        assert_eq!(ids, vec!["c", "d", "a"]);

        let capped = generator.retrieve(&theme, &corpus, 2).await;
        assert_eq!(capped.len(), 2);
    }

    #[test]
    fn test_split_batches() {
        let frags: Vec<Fragment> = (0..7).map(|i| Fragment::new(i.to_string(), "d", 1, "t")).collect();
        let batches = split_batches(frags.clone(), 3);
        assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![3, 3, 1]);

        assert_eq!(split_batches(frags[..2].to_vec(), 3).len(), 2);
        assert!(split_batches(Vec::new(), 3).is_empty());
    }

    #[test]
    fn test_retry_delay_honours_hint() {
        let rate_limited: SynthError =
            LlmError::new(ErrorCategory::RateLimit, "slow down").retry_after(Duration::from_secs(30)).into();
        let planned = Some(Duration::from_millis(10));

        assert_eq!(
            retry_delay(&rate_limited, planned, Duration::from_secs(60)),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            retry_delay(&rate_limited, planned, Duration::from_secs(5)),
            Some(Duration::from_secs(5))
        );

        let unhinted: SynthError = LlmError::new(ErrorCategory::Network, "reset").into();
        assert_eq!(retry_delay(&unhinted, planned, Duration::from_secs(60)), planned);
        assert_eq!(retry_delay(&rate_limited, None, Duration::from_secs(60)), None);
    }

    #[test]
    fn test_max_tokens_capped() {
        let mut s = settings();
        assert_eq!(s.max_tokens_for(1000), 1400);
        s.max_tokens = 512;
        assert_eq!(s.max_tokens_for(1000), 512);
    }
}
