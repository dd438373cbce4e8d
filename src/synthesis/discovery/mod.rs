//! Theme Discovery Engine
//!
//! Turns embedded fragments into an ordered list of labelled themes:
//!
//! 1. Validate and L2-normalise the vectors
//! 2. Cluster with seeded k-means++ (fixed k, or best silhouette over a range)
//! 3. Drop outliers far from their centroid
//! 4. Order clusters by size, label each one, extract keywords
//!
//! Labels never fail the run; a rejected label becomes the localized
//! generic one.

pub mod keywords;
pub mod kmeans;
pub mod labeling;
pub mod quality;

use std::time::Duration;
use tracing::{debug, info, instrument};

use self::keywords::extract_keywords;
use self::kmeans::{Clustering, kmeans, normalize, outlier_mask};
use self::labeling::ThemeLabeler;
use self::quality::select_k;
use crate::ai::{SharedProvider, TimeoutConfig};
use crate::config::DiscoveryConfig;
use crate::synthesis::orchestrator::CancelToken;
use crate::synthesis::progress::{ProgressTracker, Stage};
use crate::synthesis::prompts::templates;
use crate::types::{EmbeddedFragment, Language, Result, SynthError, Theme, ThemeCount};

const MIN_FRAGMENTS: usize = 2;

/// Explicit theme count clamped to `[2, n - 1]`; for `n = 2` the bound is 2.
pub fn clamp_theme_count(requested: usize, n: usize) -> usize {
    requested.clamp(2, n.saturating_sub(1).max(2))
}

/// Candidate range for automatic selection
fn auto_range(config: &DiscoveryConfig, n: usize) -> (usize, usize) {
    let upper = config.auto_max_themes.min(n.saturating_sub(1)).max(2);
    let lower = config.auto_min_themes.clamp(2, upper);
    (lower, upper)
}

/// Normalised vectors, or the reason they cannot be clustered
fn prepare_points(fragments: &[EmbeddedFragment]) -> Result<Vec<Vec<f32>>> {
    let dims = fragments[0].embedding.len();
    if dims == 0 {
        return Err(SynthError::Clustering(format!(
            "fragment {} has an empty embedding",
            fragments[0].id()
        )));
    }

    fragments
        .iter()
        .map(|ef| {
            if ef.embedding.len() != dims {
                return Err(SynthError::Clustering(format!(
                    "fragment {} has {} dimensions, expected {}",
                    ef.id(),
                    ef.embedding.len(),
                    dims
                )));
            }
            if ef.embedding.iter().any(|x| !x.is_finite()) {
                return Err(SynthError::Clustering(format!(
                    "fragment {} has a non-finite embedding value",
                    ef.id()
                )));
            }
            Ok(normalize(&ef.embedding))
        })
        .collect()
}

/// Clusters embedded fragments into labelled themes
pub struct ThemeDiscovery {
    provider: SharedProvider,
    config: DiscoveryConfig,
    label_timeout: Duration,
    temperature: f32,
    progress: ProgressTracker,
    cancel: CancelToken,
}

impl ThemeDiscovery {
    pub fn new(
        provider: SharedProvider,
        config: DiscoveryConfig,
        timeouts: &TimeoutConfig,
        temperature: f32,
    ) -> Self {
        Self {
            provider,
            config,
            label_timeout: timeouts.label_request,
            temperature,
            progress: ProgressTracker::new(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = progress;
        self
    }

    /// Checked before every label call
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn cluster(&self, points: &[Vec<f32>], count: ThemeCount) -> Clustering {
        let n = points.len();
        match count {
            ThemeCount::Exact(requested) => {
                let k = clamp_theme_count(requested, n);
                if k != requested {
                    info!(requested, k, fragments = n, "Clamped theme count");
                }
                kmeans(points, k, self.config.max_iterations, self.config.seed)
            }
            ThemeCount::Auto => {
                let (min_k, max_k) = auto_range(&self.config, n);
                let (k, clustering) = select_k(
                    points,
                    min_k,
                    max_k,
                    self.config.max_iterations,
                    self.config.seed,
                    |k, score| self.progress.theme_count_evaluated(k, score),
                );
                info!(k, min_k, max_k, "Selected theme count");
                clustering
            }
        }
    }

    /// Discover themes ordered by importance, most important first
    #[instrument(skip_all, fields(fragments = fragments.len(), requested = %count, language = %language))]
    pub async fn discover(
        &self,
        fragments: &[EmbeddedFragment],
        count: ThemeCount,
        language: Language,
    ) -> Result<Vec<Theme>> {
        let n = fragments.len();
        if n < MIN_FRAGMENTS {
            return Err(SynthError::InsufficientData {
                found: n,
                required: MIN_FRAGMENTS,
            });
        }

        let points = prepare_points(fragments)?;

        self.progress.stage(Stage::Clustering);
        let clustering = self.cluster(&points, count);
        let outliers = outlier_mask(&clustering.distances, self.config.outlier_z_score);
        let outlier_count = outliers.iter().filter(|&&o| o).count();

        let mut clusters: Vec<Vec<usize>> = clustering
            .members()
            .into_iter()
            .map(|mut members| {
                members.retain(|&i| !outliers[i]);
                members.sort_by(|&a, &b| {
                    clustering.distances[a]
                        .total_cmp(&clustering.distances[b])
                        .then(a.cmp(&b))
                });
                members
            })
            .filter(|members| !members.is_empty())
            .collect();

        // Stable sort: equal sizes keep cluster order
        clusters.sort_by(|a, b| b.len().cmp(&a.len()));

        info!(
            clusters = clusters.len(),
            outliers = outlier_count,
            iterations = clustering.iterations,
            "Clustering complete"
        );
        self.progress.clusters_formed(clusters.len(), outlier_count);

        self.progress.stage(Stage::Labeling);
        let labeler = ThemeLabeler::new(
            self.provider.clone(),
            templates(language),
            self.config.label_max_words,
            self.config.label_max_chars,
            self.label_timeout,
            self.temperature,
        );

        let total = clusters.len();
        let mut labels = Vec::with_capacity(total);
        for (i, members) in clusters.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(labelled = i, total, "Discovery cancelled");
                return Err(SynthError::Cancelled);
            }
            let position = i + 1;
            let excerpts: Vec<&str> = members
                .iter()
                .take(self.config.label_sample_size)
                .map(|&m| fragments[m].fragment.text.as_str())
                .collect();

            let result = labeler.label(&excerpts).await;
            let (label, fallback) = labeler.resolve(result, position);
            debug!(position, label = %label, fallback, members = members.len(), "Labelled theme");
            self.progress.theme_labeled(position, total, &label, fallback);
            labels.push((label, fallback));
        }

        let member_texts: Vec<Vec<&str>> = clusters
            .iter()
            .map(|members| members.iter().map(|&m| fragments[m].fragment.text.as_str()).collect())
            .collect();
        let keywords = extract_keywords(&member_texts, language, self.config.keyword_count);

        let themes = clusters
            .into_iter()
            .zip(labels)
            .zip(keywords)
            .enumerate()
            .map(|(i, ((members, (label, fallback)), keywords))| {
                let ids = members.iter().map(|&m| fragments[m].id().to_string()).collect();
                let mut theme = Theme::new(format!("theme-{}", i + 1), label, ids)
                    .with_importance(members.len() as f32 / n as f32)
                    .with_keywords(keywords);
                theme.label_fallback = fallback;
                theme
            })
            .collect();

        Ok(themes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::mock::MockProvider;
    use crate::types::Fragment;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    const TOPICS: [&str; 5] = ["soil", "water", "climate", "markets", "policy"];

    /// `per_group` fragments around each of `groups` orthogonal directions
    fn grouped_corpus(groups: usize, per_group: usize) -> Vec<EmbeddedFragment> {
        let dims = groups.max(2) + 3;
        let mut out = Vec::new();
        for i in 0..per_group {
            for g in 0..groups {
                let mut v = vec![0.0f32; dims];
                v[g] = 1.0;
                v[groups + i % 3] += 0.03 * (i % 7) as f32;
                let topic = TOPICS[g % TOPICS.len()];
                let text = format!("Notes about {topic} and more {topic} findings, record {i}.");
                let id = format!("f{}-{}", g, i);
                out.push(EmbeddedFragment::new(Fragment::new(id, "doc", 1 + i as u32, text), v));
            }
        }
        out
    }

    fn discovery(provider: MockProvider, config: DiscoveryConfig) -> ThemeDiscovery {
        ThemeDiscovery::new(Arc::new(provider), config, &TimeoutConfig::from_secs(30), 0.3)
    }

    fn assert_partition(themes: &[Theme], input: usize) {
        let mut seen = HashSet::new();
        for theme in themes {
            for id in &theme.fragment_ids {
                assert!(seen.insert(id.clone()), "fragment {} in two themes", id);
            }
        }
        assert!(seen.len() <= input);
    }

    #[tokio::test]
    async fn test_insufficient_data() {
        let d = discovery(MockProvider::fixed("X"), DiscoveryConfig::default());
        let one = grouped_corpus(1, 1);
        let err = d.discover(&one, ThemeCount::Auto, Language::English).await.unwrap_err();
        assert!(matches!(err, SynthError::InsufficientData { found: 1, required: 2 }));
    }

    #[tokio::test]
    async fn test_bad_vectors_rejected() {
        let d = discovery(MockProvider::fixed("X"), DiscoveryConfig::default());

        let mut mismatched = grouped_corpus(2, 2);
        mismatched[1].embedding.push(0.5);
        let err = d.discover(&mismatched, ThemeCount::Auto, Language::English).await;
        assert!(matches!(err, Err(SynthError::Clustering(_))));

        let mut nan = grouped_corpus(2, 2);
        nan[2].embedding[0] = f32::NAN;
        let err = d.discover(&nan, ThemeCount::Auto, Language::English).await;
        assert!(matches!(err, Err(SynthError::Clustering(_))));

        let mut empty = grouped_corpus(2, 2);
        for ef in &mut empty {
            ef.embedding.clear();
        }
        let err = d.discover(&empty, ThemeCount::Auto, Language::English).await;
        assert!(matches!(err, Err(SynthError::Clustering(_))));
    }

    #[tokio::test]
    async fn test_four_hundred_fifty_fragments_five_themes() {
        let corpus = grouped_corpus(5, 90);
        assert_eq!(corpus.len(), 450);
        let d = discovery(MockProvider::fixed("Soil Health"), DiscoveryConfig::default());

        let themes = d.discover(&corpus, ThemeCount::Exact(5), Language::English).await.unwrap();

        assert!(themes.len() <= 5);
        let members: usize = themes.iter().map(Theme::member_count).sum();
        assert!(members <= 450);
        assert!(themes.iter().all(|t| t.importance > 0.0));
        assert!(themes.windows(2).all(|w| w[0].importance >= w[1].importance));
        assert_partition(&themes, 450);
    }

    #[tokio::test]
    async fn test_auto_finds_groups_with_keywords() {
        let corpus = grouped_corpus(3, 12);
        let d = discovery(MockProvider::fixed("Topic"), DiscoveryConfig::default());

        let themes = d.discover(&corpus, ThemeCount::Auto, Language::English).await.unwrap();
        assert_eq!(themes.len(), 3);

        let leading: HashSet<&str> = themes.iter().map(|t| t.keywords[0].as_str()).collect();
        assert_eq!(leading, HashSet::from(["soil", "water", "climate"]));
    }

    #[tokio::test]
    async fn test_two_fragments_two_themes() {
        let corpus = grouped_corpus(2, 1);
        let d = discovery(MockProvider::fixed("Topic"), DiscoveryConfig::default());
        let themes = d.discover(&corpus, ThemeCount::Exact(9), Language::English).await.unwrap();
        assert_eq!(themes.len(), 2);
        assert!(themes.iter().all(|t| (t.importance - 0.5).abs() < 1e-6));
    }

    #[tokio::test]
    async fn test_overlong_labels_use_generic_positions() {
        let corpus = grouped_corpus(3, 6);
        let d = discovery(MockProvider::words(500), DiscoveryConfig::default());

        let themes = d.discover(&corpus, ThemeCount::Exact(3), Language::English).await.unwrap();
        let labels: Vec<&str> = themes.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["Theme 1", "Theme 2", "Theme 3"]);
        assert!(themes.iter().all(|t| t.label_fallback));
    }

    #[tokio::test]
    async fn test_labels_localized() {
        let corpus = grouped_corpus(2, 4);
        let d = discovery(MockProvider::fixed(""), DiscoveryConfig::default());
        let themes = d.discover(&corpus, ThemeCount::Exact(2), Language::German).await.unwrap();
        assert_eq!(themes[0].label, "Thema 1");
    }

    #[tokio::test]
    async fn test_progress_per_label() {
        let corpus = grouped_corpus(3, 5);
        let progress = ProgressTracker::new();
        let mut rx = progress.subscribe();
        let d = discovery(MockProvider::fixed("Topic"), DiscoveryConfig::default()).with_progress(progress);

        d.discover(&corpus, ThemeCount::Exact(3), Language::English).await.unwrap();

        let mut labeled = 0;
        let mut clustered = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                crate::synthesis::progress::ProgressEvent::ThemeLabeled { .. } => labeled += 1,
                crate::synthesis::progress::ProgressEvent::ClustersFormed { .. } => clustered = true,
                _ => {}
            }
        }
        assert_eq!(labeled, 3);
        assert!(clustered);
    }

    #[tokio::test]
    async fn test_same_seed_same_themes() {
        let corpus = grouped_corpus(4, 10);
        let a = discovery(MockProvider::fixed("T"), DiscoveryConfig::default())
            .discover(&corpus, ThemeCount::Auto, Language::English)
            .await
            .unwrap();
        let b = discovery(MockProvider::fixed("T"), DiscoveryConfig::default())
            .discover(&corpus, ThemeCount::Auto, Language::English)
            .await
            .unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_cancel_stops_labeling() {
        let corpus = grouped_corpus(3, 6);
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let provider = Arc::new(MockProvider::new(move |_, _| {
            token.cancel();
            Ok("Topic".to_string())
        }));
        let d = ThemeDiscovery::new(
            provider.clone(),
            DiscoveryConfig::default(),
            &TimeoutConfig::from_secs(30),
            0.3,
        )
        .with_cancel(cancel);

        let err = d.discover(&corpus, ThemeCount::Exact(3), Language::English).await.unwrap_err();
        assert!(matches!(err, SynthError::Cancelled));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_labels_makes_no_calls() {
        let corpus = grouped_corpus(3, 6);
        let cancel = CancelToken::new();
        cancel.cancel();
        let provider = Arc::new(MockProvider::fixed("Topic"));
        let d = ThemeDiscovery::new(
            provider.clone(),
            DiscoveryConfig::default(),
            &TimeoutConfig::from_secs(30),
            0.3,
        )
        .with_cancel(cancel);

        let err = d.discover(&corpus, ThemeCount::Exact(3), Language::English).await;
        assert!(matches!(err, Err(SynthError::Cancelled)));
        assert_eq!(provider.call_count(), 0);
    }

    #[test]
    fn test_clamp_theme_count() {
        assert_eq!(clamp_theme_count(1, 10), 2);
        assert_eq!(clamp_theme_count(20, 10), 9);
        assert_eq!(clamp_theme_count(5, 2), 2);
        assert_eq!(clamp_theme_count(4, 10), 4);
    }

    #[test]
    fn test_auto_range_small_corpus() {
        let config = DiscoveryConfig::default();
        assert_eq!(auto_range(&config, 2), (2, 2));
        assert_eq!(auto_range(&config, 5), (2, 4));
        assert_eq!(auto_range(&config, 1000), (config.auto_min_themes, config.auto_max_themes));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn test_themes_partition_input(
            vectors in prop::collection::vec(prop::collection::vec(0.01f32..1.0, 3), 2..30),
            k in 1usize..8,
        ) {
            let corpus: Vec<EmbeddedFragment> = vectors
                .into_iter()
                .enumerate()
                .map(|(i, v)| EmbeddedFragment::new(Fragment::new(format!("f{}", i), "d", 1, "text"), v))
                .collect();
            let n = corpus.len();
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let themes = runtime
                .block_on(
                    discovery(MockProvider::fixed("T"), DiscoveryConfig::default())
                        .discover(&corpus, ThemeCount::Exact(k), Language::English),
                )
                .unwrap();

            assert_partition(&themes, n);
            prop_assert!(themes.len() <= clamp_theme_count(k, n));
            prop_assert!(themes.iter().all(|t| t.member_count() > 0));
        }
    }
}
