//! In-process platform used by tests and dry runs.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::SinkError;

use super::{ReportFilter, ReportPage, ReportRef, ReportSink, ReportSource};

/// A file attached to a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Attachment name.
    pub filename: String,
    /// MIME type.
    pub mime: String,
    /// Payload.
    pub bytes: Vec<u8>,
}

/// Number of calls per platform operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `list_candidate_reports` calls.
    pub list: usize,
    /// `get_report` calls.
    pub get: usize,
    /// `attach_file` calls.
    pub attach: usize,
    /// `update_description` calls.
    pub describe: usize,
    /// `set_label` calls.
    pub label: usize,
}

#[derive(Debug, Default)]
struct State {
    reports: Vec<ReportRef>,
    files: HashMap<String, Vec<StoredFile>>,
    label_colors: HashMap<String, String>,
    calls: CallCounts,
    failing: Option<&'static str>,
}

/// Reports kept in memory, newest first.
#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    state: Mutex<State>,
}

impl InMemoryPlatform {
    /// Platform holding `reports`, newest first.
    #[must_use]
    pub fn new(reports: Vec<ReportRef>) -> Self {
        Self {
            state: Mutex::new(State { reports, ..State::default() }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every call to `operation` (`attach_file`, `update_description`,
    /// `set_label`) fail.
    pub fn fail_operation(&self, operation: &'static str) {
        self.lock().failing = Some(operation);
    }

    /// Current state of a report.
    #[must_use]
    pub fn report(&self, id: &str) -> Option<ReportRef> {
        self.lock().reports.iter().find(|r| r.id == id).cloned()
    }

    /// Files attached to a report.
    #[must_use]
    pub fn files(&self, id: &str) -> Vec<StoredFile> {
        self.lock().files.get(id).cloned().unwrap_or_default()
    }

    /// Color a label was created with.
    #[must_use]
    pub fn label_color(&self, name: &str) -> Option<String> {
        self.lock().label_colors.get(name).cloned()
    }

    /// Calls made so far.
    #[must_use]
    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    fn with_report<T>(
        &self,
        operation: &'static str,
        report_id: &str,
        update: impl FnOnce(&mut State, usize) -> T,
    ) -> Result<T, SinkError> {
        let mut state = self.lock();
        if state.failing == Some(operation) {
            return Err(SinkError::Rejected { operation, message: "injected failure".to_string() });
        }
        let index = state
            .reports
            .iter()
            .position(|r| r.id == report_id)
            .ok_or_else(|| SinkError::NotFound(report_id.to_string()))?;
        Ok(update(&mut state, index))
    }
}

#[async_trait]
impl ReportSource for InMemoryPlatform {
    async fn list_candidate_reports(
        &self,
        filter: &ReportFilter,
        first: usize,
        after: Option<&str>,
    ) -> Result<ReportPage, SinkError> {
        let mut state = self.lock();
        state.calls.list += 1;

        let start = match after {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| SinkError::Rejected { operation: "list_candidate_reports", message: format!("bad cursor {cursor}") })?,
            None => 0,
        };
        let end = (start + first).min(state.reports.len());
        let reports = state.reports.get(start..end).unwrap_or_default();

        Ok(ReportPage {
            reports: reports.iter().filter(|r| filter.admits(r)).cloned().collect(),
            next_cursor: (end < state.reports.len()).then(|| end.to_string()),
        })
    }

    async fn get_report(&self, id: &str) -> Result<Option<ReportRef>, SinkError> {
        let mut state = self.lock();
        state.calls.get += 1;
        Ok(state.reports.iter().find(|r| r.id == id).cloned())
    }
}

#[async_trait]
impl ReportSink for InMemoryPlatform {
    async fn attach_file(&self, report_id: &str, filename: &str, bytes: Vec<u8>, mime: &str) -> Result<(), SinkError> {
        self.lock().calls.attach += 1;
        self.with_report("attach_file", report_id, |state, _| {
            let files = state.files.entry(report_id.to_string()).or_default();
            files.retain(|f| f.filename != filename);
            files.push(StoredFile {
                filename: filename.to_string(),
                mime: mime.to_string(),
                bytes,
            });
        })
    }

    async fn update_description(&self, report_id: &str, text: &str) -> Result<(), SinkError> {
        self.lock().calls.describe += 1;
        self.with_report("update_description", report_id, |state, index| {
            state.reports[index].description = text.to_string();
        })
    }

    async fn set_label(&self, report_id: &str, name: &str, color: &str) -> Result<(), SinkError> {
        self.lock().calls.label += 1;
        self.with_report("set_label", report_id, |state, index| {
            state.label_colors.entry(name.to_string()).or_insert_with(|| color.to_string());
            let report = &mut state.reports[index];
            if !report.has_label(name) {
                report.labels.push(name.to_string());
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reports(n: usize) -> Vec<ReportRef> {
        (0..n)
            .map(|i| ReportRef {
                id: format!("r{i}"),
                report_types: vec!["threat-report".to_string()],
                labels: if i % 2 == 0 { vec!["rss-enhanced".to_string()] } else { Vec::new() },
                ..ReportRef::default()
            })
            .collect()
    }

    #[tokio::test]
    async fn listing_pages_and_filters() {
        let platform = InMemoryPlatform::new(reports(5));
        let filter = ReportFilter::new(["threat-report"], false, Some("rss-enhanced".to_string()));

        let first = platform.list_candidate_reports(&filter, 3, None).await.unwrap();
        assert_eq!(first.reports.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["r1"]);
        assert_eq!(first.next_cursor.as_deref(), Some("3"));

        let second = platform.list_candidate_reports(&filter, 3, first.next_cursor.as_deref()).await.unwrap();
        assert_eq!(second.reports.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["r3"]);
        assert_eq!(second.next_cursor, None);
    }

    #[tokio::test]
    async fn label_and_attachment_are_idempotent() {
        let platform = InMemoryPlatform::new(reports(2));

        platform.set_label("r1", "rss-enhanced", "#ff9900").await.unwrap();
        platform.set_label("r1", "rss-enhanced", "#000000").await.unwrap();
        platform.attach_file("r1", "a.pdf", vec![1], "application/pdf").await.unwrap();
        platform.attach_file("r1", "a.pdf", vec![2], "application/pdf").await.unwrap();

        let report = platform.report("r1").unwrap();
        assert_eq!(report.labels, vec!["rss-enhanced".to_string()]);
        assert_eq!(platform.label_color("rss-enhanced").as_deref(), Some("#ff9900"));
        assert_eq!(platform.files("r1").len(), 1);
        assert_eq!(platform.files("r1")[0].bytes, vec![2]);
    }

    #[tokio::test]
    async fn injected_failure_and_missing_report() {
        let platform = InMemoryPlatform::new(reports(1));
        platform.fail_operation("attach_file");

        assert!(matches!(
            platform.attach_file("r0", "a.pdf", Vec::new(), "application/pdf").await,
            Err(SinkError::Rejected { operation: "attach_file", .. })
        ));
        assert!(matches!(platform.update_description("nope", "x").await, Err(SinkError::NotFound(_))));
        assert_eq!(platform.calls().attach, 1);
    }
}
