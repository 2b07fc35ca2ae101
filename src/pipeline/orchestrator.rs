//! Drives one report through the pipeline and publishes the result.
//!
//! [`Orchestrator`] runs the stages for a URL and returns an
//! [`EnrichmentResult`]. [`ReportProcessor`] wraps it with the platform side:
//! it checks the processing mark before fetching, and writes description,
//! attachment and label (in that order) only after a successful run, so any
//! failure leaves the report unmarked.
//!
//! A report failure never escapes as an error. The one exception is scratch
//! space running out, which surfaces as [`Error::Io`] so the caller stops.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use crate::error::{Error, ExtractionError, FetchError, RenderError, SinkError};
use crate::extractor::{self, ExtractionStrategy};
use crate::options::Options;
use crate::platform::{ReportRef, ReportSink, ReportSource, PDF_MIME};
use crate::profiler::SiteProfile;
use crate::renderer::LayoutMode;
use crate::result::{EnrichmentResult, ExtractedArticle, SourceDocument};

use super::excerpt::{attachment_filename, build_excerpt};
use super::stages::Stages;
use super::state::{Event, Stage, StateTracker};

/// Runs the stages of one enrichment.
#[derive(Debug)]
pub struct Orchestrator<S> {
    stages: S,
    options: Options,
}

impl<S: Stages> Orchestrator<S> {
    /// Orchestrator over `stages`.
    pub const fn new(stages: S, options: Options) -> Self {
        Self { stages, options }
    }

    /// Options in effect.
    pub const fn options(&self) -> &Options {
        &self.options
    }

    /// Enrich the article at `url` for a report called `name`.
    ///
    /// An unrecovered stage failure is reported through `success`,
    /// `failed_stage` and `failure_reason`.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when a fetch or render workspace cannot be created.
    pub async fn enrich(&self, url: &str, name: &str) -> crate::Result<EnrichmentResult> {
        let mut tracker = StateTracker::default();
        let mut strategy_chain = Vec::new();

        let outcome = self.run_stages(url, name, &mut tracker, &mut strategy_chain).await;
        let outcome = outcome.and_then(|result| {
            tracker.apply(Event::Finish).map_err(|e| e.to_string())?;
            Ok(result)
        });

        let reason = match outcome {
            Ok(result) => {
                info!(url, strategy_chain = ?result.strategy_chain, images = result.image_count, "enrichment succeeded");
                return Ok(result);
            }
            Err(StageFailure::Report(reason)) => reason,
            Err(StageFailure::Resources(err)) => {
                let stage = tracker.state().pending_stage();
                error!(url, stage = ?stage, error = %err, "scratch space unavailable, stopping");
                return Err(Error::Io(err));
            }
        };

        let stage = tracker.state().pending_stage();
        if let Err(e) = tracker.apply(Event::Failed(reason.clone())) {
            debug!(error = %e, "failure recorded outside the state machine");
        }
        warn!(url, stage = ?stage, error = %reason, "enrichment failed");
        Ok(EnrichmentResult {
            success: false,
            failure_reason: Some(reason),
            failed_stage: stage,
            strategy_chain,
            ..EnrichmentResult::default()
        })
    }

    async fn run_stages(
        &self,
        url: &str,
        name: &str,
        tracker: &mut StateTracker,
        strategy_chain: &mut Vec<String>,
    ) -> Result<EnrichmentResult, StageFailure> {
        let source = self.stages.fetch(url).await?;
        debug!(url, method = %source.fetch_method_used, degraded = source.degraded, "page fetched");
        advance(tracker, Stage::Fetched)?;

        let profile = self.stages.profile(&source);
        debug!(
            score = profile.complexity_score,
            platform = %profile.detected_platform,
            recommended = %profile.recommended_strategy,
            "site profiled"
        );
        advance(tracker, Stage::Profiled)?;

        let article = self
            .extract_with_fallback(&source, &profile, strategy_chain)
            .map_err(|e| StageFailure::Report(e.to_string()))?;
        advance(tracker, Stage::Extracted)?;

        let processed = self.stages.process_images(article).await;
        advance(tracker, Stage::ImagesProcessed)?;

        let layout = LayoutMode::from_preserve(self.options.preserve_original_layout);
        let pdf_bytes = self.stages.render(&processed, layout).await?;
        advance(tracker, Stage::Rendered)?;

        let excerpt_text = build_excerpt(&processed.article, self.options.excerpt_limit);
        let filename = attachment_filename(name, layout, self.options.include_images);
        advance(tracker, Stage::Packaged)?;

        Ok(EnrichmentResult {
            pdf_bytes,
            excerpt_text,
            success: true,
            strategy_chain: strategy_chain.clone(),
            failure_reason: None,
            failed_stage: None,
            filename,
            image_count: processed.images.len(),
        })
    }

    /// Primary strategy, then its alternate once.
    fn extract_with_fallback(
        &self,
        source: &SourceDocument,
        profile: &SiteProfile,
        strategy_chain: &mut Vec<String>,
    ) -> Result<ExtractedArticle, ExtractionError> {
        let mut failures = Vec::new();
        for strategy in extractor::plan(self.options.ad_removal_strategy, profile) {
            strategy_chain.push(strategy.name().to_string());
            match self.stages.extract(source, strategy) {
                Ok(article) => return Ok(article),
                Err(e) => {
                    warn!(strategy = strategy.name(), error = %e, "extraction strategy failed");
                    failures.push(format!("{}: {e}", strategy.name()));
                }
            }
        }
        Err(ExtractionError::Exhausted(failures))
    }
}

/// Why a run stopped before packaging.
#[derive(Debug)]
enum StageFailure {
    /// This report failed; the next one may still succeed.
    Report(String),
    /// No scratch space for workspaces.
    Resources(std::io::Error),
}

impl From<String> for StageFailure {
    fn from(reason: String) -> Self {
        Self::Report(reason)
    }
}

impl From<FetchError> for StageFailure {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Workspace(io) => Self::Resources(io),
            other => Self::Report(other.to_string()),
        }
    }
}

impl From<RenderError> for StageFailure {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Workspace(io) => Self::Resources(io),
            other => Self::Report(other.to_string()),
        }
    }
}

fn advance(tracker: &mut StateTracker, stage: Stage) -> Result<(), String> {
    tracker.apply(Event::Completed(stage)).map_err(|e| e.to_string())?;
    debug!(stage = %stage, "stage completed");
    Ok(())
}

/// Processing mark written once a report has been enriched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkConfig {
    /// Label value.
    pub label: String,
    /// Label color used when the label is created.
    pub color: String,
}

/// What happened to one report.
#[derive(Debug)]
pub enum ReportOutcome {
    /// The report already carries the mark or was handled earlier in this process.
    AlreadyProcessed,
    /// No article URL could be found on the report.
    NoSourceUrl,
    /// The platform could not be read.
    Unavailable(SinkError),
    /// The pipeline failed; nothing was written.
    Failed(EnrichmentResult),
    /// The pipeline succeeded but a write failed; the report stays unmarked.
    PublishFailed {
        /// Pipeline result.
        result: EnrichmentResult,
        /// Write that failed.
        error: SinkError,
    },
    /// Description, attachment and mark written.
    Enriched(EnrichmentResult),
}

impl ReportOutcome {
    /// Whether the report was marked by this call.
    #[must_use]
    pub const fn is_enriched(&self) -> bool {
        matches!(self, Self::Enriched(_))
    }
}

/// Ids remembered by [`ReportProcessor`] before the oldest are forgotten.
pub const PROCESSED_CAPACITY: usize = 10_000;

/// Recently handled report ids, oldest evicted first. The platform mark is
/// the durable record; this only saves a `get_report` round trip.
#[derive(Debug)]
struct RecentIds {
    ids: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl RecentIds {
    fn new(capacity: usize) -> Self {
        Self { ids: HashSet::new(), order: VecDeque::new(), capacity: capacity.max(1) }
    }

    fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    fn insert(&mut self, id: &str) {
        if !self.ids.insert(id.to_string()) {
            return;
        }
        self.order.push_back(id.to_string());
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

/// Enriches reports on a platform, at most once each.
pub struct ReportProcessor<S, P: ?Sized> {
    orchestrator: Orchestrator<S>,
    platform: Arc<P>,
    mark: MarkConfig,
    processed: Mutex<RecentIds>,
}

impl<S, P> ReportProcessor<S, P>
where
    S: Stages,
    P: ReportSource + ReportSink + ?Sized,
{
    /// Processor writing to `platform` with `mark`.
    pub fn new(orchestrator: Orchestrator<S>, platform: Arc<P>, mark: MarkConfig) -> Self {
        Self::with_capacity(orchestrator, platform, mark, PROCESSED_CAPACITY)
    }

    /// Like [`ReportProcessor::new`], remembering at most `capacity` ids.
    pub fn with_capacity(orchestrator: Orchestrator<S>, platform: Arc<P>, mark: MarkConfig, capacity: usize) -> Self {
        Self {
            orchestrator,
            platform,
            mark,
            processed: Mutex::new(RecentIds::new(capacity)),
        }
    }

    /// Mark written on success.
    pub const fn mark(&self) -> &MarkConfig {
        &self.mark
    }

    fn processed(&self) -> MutexGuard<'_, RecentIds> {
        self.processed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `report_id` was enriched or seen marked by this processor.
    pub fn is_processed(&self, report_id: &str) -> bool {
        self.processed().contains(report_id)
    }

    /// Number of ids currently remembered.
    pub fn remembered(&self) -> usize {
        self.processed().len()
    }

    /// Enrich one report.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when scratch space is unavailable. Every other failure is
    /// a [`ReportOutcome`].
    pub async fn process(&self, report: &ReportRef) -> crate::Result<ReportOutcome> {
        let report_id = report.id.as_str();
        if self.is_processed(report_id) {
            debug!(report_id, "already processed in this session");
            return Ok(ReportOutcome::AlreadyProcessed);
        }

        let current = match self.platform.get_report(report_id).await {
            Ok(Some(current)) => current,
            Ok(None) => return Ok(ReportOutcome::Unavailable(SinkError::NotFound(report_id.to_string()))),
            Err(e) => {
                error!(report_id, error = %e, "could not read report");
                return Ok(ReportOutcome::Unavailable(e));
            }
        };
        if current.has_label(&self.mark.label) {
            debug!(report_id, label = %self.mark.label, "report already marked");
            self.processed().insert(report_id);
            return Ok(ReportOutcome::AlreadyProcessed);
        }

        let Some(url) = current.source_url() else {
            info!(report_id, name = %current.name, "no article URL on report");
            return Ok(ReportOutcome::NoSourceUrl);
        };

        info!(report_id, url = %url, name = %current.name, "enriching report");
        let result = self.orchestrator.enrich(url.as_str(), &current.name).await?;
        if !result.success {
            error!(
                report_id,
                url = %url,
                stage = ?result.failed_stage,
                error = result.failure_reason.as_deref().unwrap_or("unknown"),
                "report enrichment failed"
            );
            return Ok(ReportOutcome::Failed(result));
        }

        if let Err(error) = self.publish(report_id, &result).await {
            error!(report_id, error = %error, "publishing enrichment failed, report left unmarked");
            return Ok(ReportOutcome::PublishFailed { result, error });
        }

        self.processed().insert(report_id);
        info!(report_id, filename = %result.filename, "report enriched and marked");
        Ok(ReportOutcome::Enriched(result))
    }

    /// Description, then attachment, then mark.
    async fn publish(&self, report_id: &str, result: &EnrichmentResult) -> Result<(), SinkError> {
        self.platform.update_description(report_id, &result.excerpt_text).await?;
        self.platform
            .attach_file(report_id, &result.filename, result.pdf_bytes.clone(), PDF_MIME)
            .await?;
        self.platform.set_label(report_id, &self.mark.label, &self.mark.color).await
    }
}
