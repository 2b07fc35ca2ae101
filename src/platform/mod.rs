//! Threat-intel platform access.
//!
//! The pipeline only sees the [`ReportSource`] and [`ReportSink`] traits.
//! [`opencti::OpenCtiClient`] talks to a live platform over GraphQL;
//! [`memory::InMemoryPlatform`] keeps everything in process for tests and
//! dry runs.

pub mod memory;
pub mod opencti;

use async_trait::async_trait;
use url::Url;

use crate::error::SinkError;
use crate::url_utils::find_external_url;

pub use memory::InMemoryPlatform;
pub use opencti::OpenCtiClient;

/// MIME type of rendered attachments.
pub const PDF_MIME: &str = "application/pdf";

/// A report as seen by the connector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportRef {
    /// Platform id.
    pub id: String,
    /// Report name.
    pub name: String,
    /// Current description.
    pub description: String,
    /// External reference URLs, in platform order.
    pub external_references: Vec<String>,
    /// Report types (`threat-report`, `rss-feed`, ...).
    pub report_types: Vec<String>,
    /// Label values currently attached.
    pub labels: Vec<String>,
}

impl ReportRef {
    /// Whether the report carries `label`.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// The article URL this report points at: external references first,
    /// then the first URL in the description.
    #[must_use]
    pub fn source_url(&self) -> Option<Url> {
        find_external_url(self.external_references.iter().map(String::as_str), &self.description)
    }
}

/// Which reports are candidates for enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFilter {
    /// Accepted report types, lowercased. Ignored when `process_all` is set.
    pub target_types: Vec<String>,
    /// Accept every report type.
    pub process_all: bool,
    /// Reports carrying this label are excluded.
    pub exclude_label: Option<String>,
}

impl ReportFilter {
    /// Filter for the given types and mark.
    #[must_use]
    pub fn new<I, S>(target_types: I, process_all: bool, exclude_label: Option<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            target_types: target_types
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            process_all,
            exclude_label,
        }
    }

    /// Whether `report` passes the type filter and is not already marked.
    #[must_use]
    pub fn admits(&self, report: &ReportRef) -> bool {
        if self.exclude_label.as_deref().is_some_and(|label| report.has_label(label)) {
            return false;
        }
        self.process_all
            || report
                .report_types
                .iter()
                .any(|t| self.target_types.contains(&t.to_lowercase()))
    }
}

/// One page of a report listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportPage {
    /// Reports on this page that pass the filter, newest first.
    pub reports: Vec<ReportRef>,
    /// Cursor for the next page, `None` on the last one.
    pub next_cursor: Option<String>,
}

/// Read access to reports.
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// List up to `first` reports (newest first) starting after `after`,
    /// keeping only those admitted by `filter`.
    async fn list_candidate_reports(
        &self,
        filter: &ReportFilter,
        first: usize,
        after: Option<&str>,
    ) -> Result<ReportPage, SinkError>;

    /// Fetch a single report, `None` when it does not exist.
    async fn get_report(&self, id: &str) -> Result<Option<ReportRef>, SinkError>;
}

/// Write access to reports. Every operation is idempotent.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Attach a file. A file with the same name replaces the previous one.
    async fn attach_file(&self, report_id: &str, filename: &str, bytes: Vec<u8>, mime: &str) -> Result<(), SinkError>;

    /// Replace the report description.
    async fn update_description(&self, report_id: &str, text: &str) -> Result<(), SinkError>;

    /// Add `name` as a label, creating it with `color` if needed. Adding a
    /// label the report already has is a no-op.
    async fn set_label(&self, report_id: &str, name: &str, color: &str) -> Result<(), SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(types: &[&str], labels: &[&str]) -> ReportRef {
        ReportRef {
            id: "r1".to_string(),
            report_types: types.iter().map(ToString::to_string).collect(),
            labels: labels.iter().map(ToString::to_string).collect(),
            ..ReportRef::default()
        }
    }

    #[test]
    fn filter_matches_types_case_insensitively() {
        let filter = ReportFilter::new(["Threat-Report", " rss-feed "], false, None);
        assert!(filter.admits(&report(&["THREAT-REPORT"], &[])));
        assert!(filter.admits(&report(&["rss-feed"], &[])));
        assert!(!filter.admits(&report(&["internal"], &[])));
    }

    #[test]
    fn process_all_skips_type_filter_but_not_mark() {
        let filter = ReportFilter::new(Vec::<String>::new(), true, Some("rss-enhanced".to_string()));
        assert!(filter.admits(&report(&["anything"], &[])));
        assert!(!filter.admits(&report(&["anything"], &["rss-enhanced"])));
    }

    #[test]
    fn source_url_prefers_external_reference() {
        let r = ReportRef {
            description: "See https://desc.example.com/post".to_string(),
            external_references: vec!["https://ref.example.com/a".to_string()],
            ..ReportRef::default()
        };
        assert_eq!(r.source_url().map(String::from).as_deref(), Some("https://ref.example.com/a"));

        let r = ReportRef { external_references: Vec::new(), ..r };
        assert_eq!(r.source_url().map(String::from).as_deref(), Some("https://desc.example.com/post"));
    }
}
