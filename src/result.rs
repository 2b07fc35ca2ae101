//! Data carried between pipeline stages.
//!
//! Each type is produced by exactly one stage and consumed by the next. None
//! of them is persisted; the orchestrator drops them once a report is done.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

use crate::fetcher::FetchMethod;
use crate::pipeline::Stage;

/// Raw page as returned by the network fetcher.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Final URL of the page (after redirects when known).
    pub url: Url,

    /// Decoded HTML.
    pub raw_html: String,

    /// Transport strategy that produced `raw_html`.
    pub fetch_method_used: FetchMethod,

    /// When the body was received.
    pub fetched_at: DateTime<Utc>,

    /// Set when no strategy cleared the sparse-content threshold and this is
    /// the longest body seen.
    pub degraded: bool,
}

impl SourceDocument {
    /// Wrap HTML that was obtained outside the fetcher (files, stdin).
    #[must_use]
    pub fn from_html(url: Url, raw_html: impl Into<String>) -> Self {
        Self {
            url,
            raw_html: raw_html.into(),
            fetch_method_used: FetchMethod::Direct,
            fetched_at: Utc::now(),
            degraded: false,
        }
    }
}

/// Extraction strategy that produced an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyUsed {
    /// Readability rebuild.
    Extract,
    /// Denylist cleanup of the original DOM.
    Minimal,
}

impl StrategyUsed {
    /// Lowercase name, as recorded in strategy chains.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Minimal => "minimal",
        }
    }
}

impl fmt::Display for StrategyUsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cleaned article payload.
///
/// `body_html` never contains script, style, iframe or tracking elements.
/// `image_urls` is absolute, in document order, without duplicates.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedArticle {
    /// Article title.
    pub title: String,

    /// Body HTML fragment (no `<html>`/`<head>` wrapper).
    pub body_html: String,

    /// Image URLs found in `body_html`.
    pub image_urls: Vec<String>,

    /// Strategy that produced this article.
    pub strategy_used: StrategyUsed,

    /// Author line, when the page declares one.
    pub byline: Option<String>,

    /// Publication time, when the page declares one.
    pub published: Option<DateTime<Utc>>,

    /// Source page URL.
    pub source_url: Url,

    /// CMS theme name taken from asset paths, when the page is a CMS page.
    pub cms_theme: Option<String>,
}

impl ExtractedArticle {
    /// Plain text of `body_html` with whitespace collapsed.
    #[must_use]
    pub fn text(&self) -> String {
        let doc = crate::dom::parse(&self.body_html);
        crate::dom::normalized_text(&doc.select("body"))
    }

    /// Plain text of `body_html` with one blank line between blocks.
    #[must_use]
    pub fn paragraph_text(&self) -> String {
        crate::dom::text_with_breaks(&crate::dom::parse(&self.body_html))
    }
}

/// One image downloaded and re-encoded by the image pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    /// Absolute URL the image was downloaded from.
    pub source_url: String,

    /// Reference written into the article body (a `data:` URI).
    pub local_reference: String,

    /// Size of the re-encoded payload in bytes.
    pub byte_size: usize,

    /// JPEG quality used for re-encoding.
    pub quality_applied: u8,
}

/// Article after the image pipeline ran.
#[derive(Debug, Clone)]
pub struct ProcessedArticle {
    /// Article with image references rewritten or stripped.
    pub article: ExtractedArticle,

    /// Images embedded into `article.body_html`, in document order.
    pub images: Vec<ProcessedImage>,
}

/// Terminal artifact of one orchestrator run.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentResult {
    /// Rendered PDF. Empty on failure.
    pub pdf_bytes: Vec<u8>,

    /// Description text to merge into the report.
    pub excerpt_text: String,

    /// Whether the run reached `Succeeded`.
    pub success: bool,

    /// Strategy names attempted, in order (`extract`, `minimal`).
    pub strategy_chain: Vec<String>,

    /// Root cause when `success` is false.
    pub failure_reason: Option<String>,

    /// Stage at which the run failed.
    pub failed_stage: Option<Stage>,

    /// Attachment filename for `pdf_bytes`.
    pub filename: String,

    /// Number of images embedded in the PDF.
    pub image_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_used_names_are_lowercase() {
        assert_eq!(StrategyUsed::Extract.to_string(), "extract");
        assert_eq!(StrategyUsed::Minimal.as_str(), "minimal");
    }

    #[test]
    fn article_text_collapses_whitespace() {
        let article = ExtractedArticle {
            title: "t".to_string(),
            body_html: "<h1>Title</h1>\n<p>first   line</p>\n<p>second</p>".to_string(),
            image_urls: Vec::new(),
            strategy_used: StrategyUsed::Extract,
            byline: None,
            published: None,
            source_url: Url::parse("https://example.com/").unwrap(),
            cms_theme: None,
        };
        assert_eq!(article.text(), "Title first line second");
    }
}
