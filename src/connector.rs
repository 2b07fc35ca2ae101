//! Long-running connector service.
//!
//! Optionally works through the existing backlog, then polls the platform
//! for the newest reports every `wait_time`. Reports are processed one at a
//! time. Shutdown is checked between reports and interrupts the sleeps.
//! Running out of scratch space stops the service; platform errors only
//! delay the next cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::Error;
use crate::pipeline::{ReportOutcome, ReportProcessor, Stages};
use crate::platform::{ReportFilter, ReportRef, ReportSink, ReportSource};

/// Scheduling knobs for [`Connector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorSettings {
    /// Sleep between poll cycles.
    pub wait_time: Duration,
    /// Which reports are candidates.
    pub filter: ReportFilter,
    /// Run the backlog before polling.
    pub process_all_on_start: bool,
    /// Backlog bound, 0 for unbounded.
    pub max_reports_on_start: usize,
    /// Reports requested per poll cycle.
    pub cycle_size: usize,
    /// Page size while walking the backlog.
    pub backlog_page: usize,
    /// Pause between backlog reports.
    pub report_pause: Duration,
    /// Sleep after a failed cycle.
    pub error_backoff: Duration,
}

impl ConnectorSettings {
    /// Settings from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            wait_time: Duration::from_secs(config.connector.wait_time),
            filter: config.report_filter(),
            process_all_on_start: config.connector.process_all_on_start,
            max_reports_on_start: config.connector.max_reports_on_start,
            ..Self::default()
        }
    }
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            wait_time: Duration::from_secs(60),
            filter: ReportFilter::new(crate::config::DEFAULT_TARGET_REPORT_TYPES, true, None),
            process_all_on_start: false,
            max_reports_on_start: 100,
            cycle_size: 20,
            backlog_page: 100,
            report_pause: Duration::from_millis(500),
            error_backoff: Duration::from_secs(60),
        }
    }
}

/// Counts for one pass over a set of reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Reports handed to the processor.
    pub seen: usize,
    /// Reports enriched and marked.
    pub enriched: usize,
    /// Reports skipped (marked already, or no article URL).
    pub skipped: usize,
    /// Reports whose pipeline or publish step failed.
    pub failed: usize,
}

impl CycleSummary {
    fn record(&mut self, outcome: &ReportOutcome) {
        self.seen += 1;
        match outcome {
            ReportOutcome::Enriched(_) => self.enriched += 1,
            ReportOutcome::AlreadyProcessed | ReportOutcome::NoSourceUrl => self.skipped += 1,
            ReportOutcome::Unavailable(_) | ReportOutcome::Failed(_) | ReportOutcome::PublishFailed { .. } => {
                self.failed += 1;
            }
        }
    }
}

/// Connector bound to one platform.
pub struct Connector<S, P: ?Sized> {
    processor: ReportProcessor<S, P>,
    platform: Arc<P>,
    settings: ConnectorSettings,
}

impl<S, P> Connector<S, P>
where
    S: Stages,
    P: ReportSource + ReportSink + ?Sized,
{
    /// Connector listing from `platform` and enriching through `processor`.
    pub const fn new(processor: ReportProcessor<S, P>, platform: Arc<P>, settings: ConnectorSettings) -> Self {
        Self { processor, platform, settings }
    }

    /// Scheduling in effect.
    pub const fn settings(&self) -> &ConnectorSettings {
        &self.settings
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when scratch space runs out. Platform errors are logged
    /// and retried after `error_backoff`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> crate::Result<()> {
        info!(
            wait_time = ?self.settings.wait_time,
            process_all_on_start = self.settings.process_all_on_start,
            "connector started"
        );

        if self.settings.process_all_on_start {
            match self.backlog(&mut shutdown).await {
                Ok(summary) => info!(?summary, "backlog finished"),
                Err(e) if e.is_resource_exhaustion() => return Err(e),
                Err(e) => error!(error = %e, "backlog aborted"),
            }
        }

        loop {
            if is_shutdown(&shutdown) {
                break;
            }
            let delay = match self.poll_cycle(&mut shutdown).await {
                Ok(summary) => {
                    debug!(?summary, "poll cycle finished");
                    self.settings.wait_time
                }
                Err(e) if e.is_resource_exhaustion() => return Err(e),
                Err(e) => {
                    error!(error = %e, backoff = ?self.settings.error_backoff, "poll cycle failed");
                    self.settings.error_backoff
                }
            };
            if pause(&mut shutdown, delay).await {
                break;
            }
        }
        info!("connector stopped");
        Ok(())
    }

    /// Process the newest `cycle_size` candidate reports.
    ///
    /// # Errors
    ///
    /// [`Error::Sink`] when the candidates cannot be listed, [`Error::Io`]
    /// when scratch space runs out. The remaining reports are left for later.
    pub async fn poll_cycle(&self, shutdown: &mut watch::Receiver<bool>) -> crate::Result<CycleSummary> {
        let page = self
            .platform
            .list_candidate_reports(&self.settings.filter, self.settings.cycle_size, None)
            .await?;
        debug!(candidates = page.reports.len(), "poll cycle");

        let mut summary = CycleSummary::default();
        for report in &page.reports {
            if is_shutdown(shutdown) {
                break;
            }
            self.handle(report, &mut summary).await?;
        }
        Ok(summary)
    }

    /// Walk every candidate report, page by page, up to `max_reports_on_start`.
    ///
    /// # Errors
    ///
    /// Same as [`Connector::poll_cycle`].
    pub async fn backlog(&self, shutdown: &mut watch::Receiver<bool>) -> crate::Result<CycleSummary> {
        let limit = match self.settings.max_reports_on_start {
            0 => usize::MAX,
            n => n,
        };
        let mut summary = CycleSummary::default();
        let mut cursor: Option<String> = None;

        'pages: loop {
            let page = self
                .platform
                .list_candidate_reports(&self.settings.filter, self.settings.backlog_page, cursor.as_deref())
                .await?;
            info!(candidates = page.reports.len(), processed = summary.seen, "backlog page");

            for report in &page.reports {
                if summary.seen >= limit {
                    info!(limit, "backlog limit reached");
                    break 'pages;
                }
                if is_shutdown(shutdown) {
                    break 'pages;
                }
                self.handle(report, &mut summary).await?;
                if pause(shutdown, self.settings.report_pause).await {
                    break 'pages;
                }
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(summary)
    }

    async fn handle(&self, report: &ReportRef, summary: &mut CycleSummary) -> Result<(), Error> {
        let outcome = self.processor.process(report).await.inspect_err(|e| {
            error!(report_id = %report.id, error = %e, processed = summary.seen, "aborting run");
        })?;
        if let ReportOutcome::Unavailable(ref e) = outcome {
            warn!(report_id = %report.id, error = %e, "report skipped");
        }
        summary.record(&outcome);
        Ok(())
    }
}

fn is_shutdown(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// Sleep for `duration`. Returns `true` when shutdown was requested.
async fn pause(shutdown: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    if is_shutdown(shutdown) {
        return true;
    }
    let changed = tokio::select! {
        () = tokio::time::sleep(duration) => return false,
        changed = shutdown.changed() => changed,
    };
    changed.is_err() || is_shutdown(shutdown)
}
