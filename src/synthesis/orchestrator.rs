//! Synthesis Orchestrator
//!
//! Runs one job end to end on a single task:
//!
//! ```text
//! Planning → Discovering → GeneratingChapter(0..n) → Formatting → Complete
//!     └──────────┴───────────────┴──────────────────────┴──► Failed | Cancelled
//! ```
//!
//! Chapters and their sections are written strictly one at a time. The
//! length loop keeps adding sections until a chapter reaches its target, the
//! completion ceiling trims the section that would overshoot, and the
//! iteration cap finalizes short chapters as `UnderTarget`.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard, broadcast};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use super::discovery::ThemeDiscovery;
use super::generator::{ChapterGenerator, SectionRequest, split_batches};
use super::language::LanguageDetector;
use super::length::{ceiling, chapter_targets, section_request, total_target};
use super::progress::{ProgressEvent, ProgressTracker, Stage};
use super::{SynthesisOptions, SynthesisRequest};
use crate::ai::{SharedProvider, with_timeout};
use crate::store::SharedStore;
use crate::types::{
    Chapter, ChapterStatus, DocumentMetadata, EmbeddedFragment, JobStatus, Result, SynthError,
    SynthesisJob, SynthesisResult, Theme, count_words, trim_to_word_budget,
};

/// Cooperative cancellation flag, checked before every generation call
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Renders finished chapters; document formats live outside this crate.
#[async_trait]
pub trait OutputFormatter: Send + Sync {
    async fn format(&self, chapters: &[Chapter], metadata: &DocumentMetadata) -> Result<()>;
}

/// Handle to a job spawned with [`Orchestrator::start`]
pub struct JobHandle {
    cancel: CancelToken,
    progress: ProgressTracker,
    /// Subscribed before `JobStarted` was sent
    events: Option<broadcast::Receiver<ProgressEvent>>,
    task: JoinHandle<Result<SynthesisResult>>,
}

impl JobHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Progress events; the first subscriber sees the job from `JobStarted`
    pub fn subscribe(&mut self) -> broadcast::Receiver<ProgressEvent> {
        self.events.take().unwrap_or_else(|| self.progress.subscribe())
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the job to end
    pub async fn wait(self) -> Result<SynthesisResult> {
        self.task
            .await
            .map_err(|e| SynthError::Task(e.to_string()))?
    }
}

/// Runs synthesis jobs against one backend, one job at a time
#[derive(Clone)]
pub struct Orchestrator {
    provider: SharedProvider,
    store: SharedStore,
    formatter: Option<Arc<dyn OutputFormatter>>,
    active: Arc<Mutex<()>>,
    progress: ProgressTracker,
}

impl Orchestrator {
    pub fn new(provider: SharedProvider, store: SharedStore) -> Self {
        Self {
            provider,
            store,
            formatter: None,
            active: Arc::new(Mutex::new(())),
            progress: ProgressTracker::new(),
        }
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn OutputFormatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn is_busy(&self) -> bool {
        self.active.try_lock().is_err()
    }

    fn admit(&self) -> Result<OwnedMutexGuard<()>> {
        self.active
            .clone()
            .try_lock_owned()
            .map_err(|_| SynthError::JobInProgress)
    }

    /// Run a job on the current task
    pub async fn run(&self, request: SynthesisRequest, cancel: CancelToken) -> Result<SynthesisResult> {
        let guard = self.admit()?;
        let job = self.begin(&request);
        self.execute(job, request, cancel, guard).await
    }

    /// Spawn a job; a second job while one is active is rejected
    pub fn start(&self, request: SynthesisRequest) -> Result<JobHandle> {
        let guard = self.admit()?;
        let events = self.progress.subscribe();
        let job = self.begin(&request);

        let cancel = CancelToken::new();
        let this = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move { this.execute(job, request, token, guard).await });

        Ok(JobHandle {
            cancel,
            progress: self.progress.clone(),
            events: Some(events),
            task,
        })
    }

    /// Create the job record and announce it
    fn begin(&self, request: &SynthesisRequest) -> SynthesisJob {
        let mut job = SynthesisJob::new(request.title.clone(), request.options.level);
        job.author = request.author.clone();
        job.fragments_per_chapter = request.options.fragments_per_chapter;
        job.include_citations = request.options.include_citations;

        self.progress.start(job.id, &job.title);
        info!(job = %job.id, level = %job.level, "Synthesis job started");
        job
    }

    #[instrument(skip_all, fields(title = %request.title, job = %job.id))]
    async fn execute(
        &self,
        mut job: SynthesisJob,
        request: SynthesisRequest,
        cancel: CancelToken,
        _guard: OwnedMutexGuard<()>,
    ) -> Result<SynthesisResult> {
        match self.synthesize(&mut job, request, &cancel).await {
            Ok(result) => {
                self.progress.finish(result.job.status, result.total_words());
                info!(summary = %result.summary(), "Synthesis job finished");
                Ok(result)
            }
            Err(e) => {
                error!(job = %job.id, error = %e, "Synthesis job failed");
                job.advance(JobStatus::Failed);
                self.progress.warning(e.to_string());
                self.progress.finish(JobStatus::Failed, 0);
                Err(e)
            }
        }
    }

    async fn synthesize(
        &self,
        job: &mut SynthesisJob,
        request: SynthesisRequest,
        cancel: &CancelToken,
    ) -> Result<SynthesisResult> {
        let options = request.options;
        let timeouts = &options.generator.timeouts;

        self.progress.stage(Stage::LoadingFragments);
        // An unreachable store leaves nothing to cluster
        let fragments = with_timeout(
            timeouts.store_query,
            self.store.query_fragments(&request.filter),
            "fragment query",
        )
        .await
        .map_err(|e| SynthError::Clustering(format!("fragment store unreachable: {}", e)))?;
        if fragments.is_empty() {
            return Err(SynthError::InsufficientData {
                found: 0,
                required: 1,
            });
        }
        let source_words: usize = fragments.iter().map(|ef| ef.fragment.word_count()).sum();
        self.progress.fragments_loaded(fragments.len(), source_words);
        info!(fragments = fragments.len(), source_words, "Loaded fragments");

        self.progress.stage(Stage::DetectingLanguage);
        let detector = LanguageDetector::new(&options.language_detection);
        let detection = detector.resolve(options.language, &fragments);
        job.language = detection.language;
        self.progress
            .language_resolved(detection.language, detection.detected);
        let target_words = total_target(source_words, options.level);

        let themes = match request.themes {
            Some(themes) => {
                info!(themes = themes.len(), "Using supplied themes");
                themes
            }
            None => {
                job.advance(JobStatus::Discovering);
                let discovered = ThemeDiscovery::new(
                    self.provider.clone(),
                    options.discovery.clone(),
                    timeouts,
                    options.generator.temperature,
                )
                .with_progress(self.progress.clone())
                .with_cancel(cancel.clone())
                .discover(&fragments, options.theme_count, job.language)
                .await;

                match discovered {
                    Err(SynthError::Cancelled) => {
                        info!("Synthesis cancelled during discovery");
                        job.advance(JobStatus::Cancelled);
                        return Ok(SynthesisResult {
                            job: job.clone(),
                            chapters: Vec::new(),
                            source_words,
                            target_words,
                            error: None,
                        });
                    }
                    other => other?,
                }
            }
        };
        if themes.is_empty() {
            return Err(SynthError::Config("no themes to synthesize".to_string()));
        }
        job.themes = themes.clone();

        let targets = chapter_targets(
            &themes,
            target_words,
            options.length_policy,
            options.min_chapter_words,
            options.max_chapter_words,
        );
        info!(target_words, chapters = themes.len(), "Planned chapters");

        self.progress.stage(Stage::Generating);
        let mut generator = ChapterGenerator::new(
            self.provider.clone(),
            self.store.clone(),
            options.generator.clone(),
            job.language,
        );

        let mut chapters = Vec::with_capacity(themes.len());
        let mut cancelled = false;
        for (index, (theme, &target)) in themes.iter().zip(&targets).enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            job.advance(JobStatus::GeneratingChapter(index));

            let chapter = self
                .write_chapter(
                    &mut generator,
                    ChapterPlan {
                        index,
                        total: themes.len(),
                        document_title: &job.title,
                        theme,
                        target,
                    },
                    &fragments,
                    &options,
                    cancel,
                )
                .await;

            self.progress
                .chapter_finished(index, chapter.status, chapter.word_count);
            let stop = chapter.status == ChapterStatus::Cancelled;
            chapters.push(chapter);
            if stop {
                cancelled = true;
                break;
            }
        }

        let mut job_error = None;
        if cancelled {
            info!(chapters = chapters.len(), "Synthesis cancelled");
            job.advance(JobStatus::Cancelled);
        } else {
            job.advance(JobStatus::Formatting);
            self.progress.stage(Stage::Formatting);

            let formatted = match &self.formatter {
                Some(formatter) => formatter.format(&chapters, &DocumentMetadata::from(&*job)).await,
                None => Ok(()),
            };

            if let Err(e) = formatted {
                error!(error = %e, "Output formatting failed");
                job_error = Some(e.to_string());
                job.advance(JobStatus::Failed);
            } else if chapters.iter().all(|c| c.status == ChapterStatus::Failed) {
                job_error = Some("every chapter failed".to_string());
                job.advance(JobStatus::Failed);
            } else {
                job.advance(JobStatus::Complete);
            }
        }

        Ok(SynthesisResult {
            job: job.clone(),
            chapters,
            source_words,
            target_words,
            error: job_error,
        })
    }

    /// Length loop for one chapter
    #[instrument(skip_all, fields(chapter = plan.index, target = plan.target))]
    async fn write_chapter(
        &self,
        generator: &mut ChapterGenerator,
        plan: ChapterPlan<'_>,
        corpus: &[EmbeddedFragment],
        options: &SynthesisOptions,
        cancel: &CancelToken,
    ) -> Chapter {
        let ChapterPlan {
            index,
            total,
            document_title,
            theme,
            target,
        } = plan;

        let mut chapter = Chapter::new(index, theme, target);
        chapter.status = ChapterStatus::InProgress;
        self.progress
            .chapter_started(index, total, &theme.label, target);

        let retrieved = generator
            .retrieve(theme, corpus, options.fragments_per_chapter)
            .await;
        let batches = split_batches(retrieved, options.batch_count);
        if batches.is_empty() {
            warn!(theme = %theme.id, "No source fragments for chapter");
            chapter.fail("no source fragments for theme");
            return chapter;
        }

        let limit = ceiling(target, options.completion_ceiling);
        let cap = options.iteration_cap(batches.len());

        let status = loop {
            if chapter.word_count >= target {
                break ChapterStatus::Complete;
            }
            if chapter.iterations >= cap {
                info!(words = chapter.word_count, iterations = chapter.iterations, "Iteration cap reached below target");
                break ChapterStatus::UnderTarget;
            }
            if cancel.is_cancelled() {
                break ChapterStatus::Cancelled;
            }

            let iteration = chapter.iterations;
            let sections_left = if iteration < batches.len() {
                batches.len() - iteration
            } else {
                1
            };
            let requested = section_request(target, chapter.word_count, sections_left);
            let prior_text = (!chapter.sections.is_empty()).then(|| chapter.text());

            let outcome = generator
                .generate_section(&SectionRequest {
                    chapter: index,
                    document_title,
                    theme,
                    batch: &batches[iteration % batches.len()],
                    prior_text: prior_text.as_deref(),
                    requested_words: requested,
                })
                .await;

            match outcome {
                Ok(text) => {
                    chapter.iterations += 1;
                    let room = limit.saturating_sub(chapter.word_count);
                    let missing = target.saturating_sub(chapter.word_count);
                    let words = count_words(&text);
                    let text = if words > room {
                        info!(words, room, missing, "Trimming section at completion ceiling");
                        trim_to_word_budget(&text, missing, room)
                    } else {
                        text
                    };

                    let section_words = count_words(&text);
                    if section_words > 0 {
                        chapter.push_section(text);
                    }
                    self.progress.section_generated(
                        index,
                        chapter.iterations,
                        section_words,
                        chapter.word_count,
                        target,
                    );
                }
                Err(e) => {
                    error!(error = %e, "Chapter generation failed");
                    chapter.error = Some(e.to_string());
                    break ChapterStatus::Failed;
                }
            }
        };
        chapter.status = status;

        let citations = generator.finalize_citations(index);
        if options.include_citations {
            chapter.citations = citations;
        }

        info!(
            status = %chapter.status,
            words = chapter.word_count,
            iterations = chapter.iterations,
            citations = chapter.citations.len(),
            "Chapter finished"
        );
        chapter
    }
}

struct ChapterPlan<'a> {
    index: usize,
    total: usize,
    document_title: &'a str,
    theme: &'a Theme,
    target: usize,
}
