//! # rs-report-enhancer
//!
//! Enriches threat-intel reports that only carry a link to a web article.
//!
//! For each report the connector fetches the linked page, profiles the site,
//! extracts the article (readability rebuild or denylist cleanup, with one
//! fallback), embeds its images, renders a PDF and writes the excerpt,
//! attachment and a processing mark back to the platform.
//!
//! ## Quick Start
//!
//! ```rust
//! use rs_report_enhancer::{extract_html, Options, StrategyMode};
//!
//! let html = r#"<html><head><title>Campaign analysis</title></head><body>
//! <article><h1>Campaign analysis</h1>
//! <p>The actor used spear-phishing emails carrying a malicious document that
//! dropped a loader, which in turn fetched the final payload from a staging
//! server registered a week before the first observed intrusion.</p>
//! </article></body></html>"#;
//!
//! let options = Options { ad_removal_strategy: StrategyMode::Minimal, ..Options::default() };
//! let article = extract_html(html, "https://blog.example.com/campaign", &options)?;
//! assert!(article.body_html.contains("spear-phishing"));
//! # Ok::<(), rs_report_enhancer::Error>(())
//! ```
//!
//! ## Layout
//!
//! - [`fetcher`]: direct, command-line and browser fetch with fallback
//! - [`profiler`]: structural features and strategy recommendation
//! - [`extractor`]: `extract` and `minimal` strategies
//! - [`image_pipeline`]: download, shrink and embed images
//! - [`renderer`]: print shell and wkhtmltopdf
//! - [`pipeline`]: per-report state machine and publishing
//! - [`platform`]: report source/sink traits, OpenCTI and in-memory backends
//! - [`connector`]: backlog and poll loop

mod error;
mod options;
mod patterns;
mod result;

/// DOM helpers over `dom_query`.
pub mod dom;

/// Character encoding detection and transcoding.
pub mod encoding;

/// URL validation, resolution and discovery.
pub mod url_utils;

pub mod config;
pub mod connector;
pub mod extractor;
pub mod fetcher;
pub mod image_pipeline;
pub mod logging;
pub mod pipeline;
pub mod platform;
pub mod process;
pub mod profiler;
pub mod renderer;

// Public API - re-exports
pub use error::{ConfigError, Error, ExtractionError, FetchError, ImageError, RenderError, Result, SinkError};
pub use options::{Options, StrategyMode};
pub use result::{
    EnrichmentResult, ExtractedArticle, ProcessedArticle, ProcessedImage, SourceDocument, StrategyUsed,
};

use crate::extractor::ExtractionStrategy;

/// Extract the article from an HTML string without touching the network.
///
/// The page is profiled and the strategies planned for
/// `options.ad_removal_strategy` are tried in order, as the pipeline does.
///
/// # Errors
///
/// [`Error::Fetch`] when `url` is not an absolute http(s) URL, and
/// [`Error::Extraction`] when both strategies fail.
pub fn extract_html(html: &str, url: &str, options: &Options) -> Result<ExtractedArticle> {
    let url = url_utils::parse_http_url(url).ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;
    let source = SourceDocument::from_html(url, html);
    let site = profiler::profile(&source, &options.profile_thresholds);

    let mut failures = Vec::new();
    for strategy in extractor::plan(options.ad_removal_strategy, &site) {
        match strategy.attempt(&source, options) {
            Ok(article) => return Ok(article),
            Err(e) => failures.push(format!("{}: {e}", strategy.name())),
        }
    }
    Err(ExtractionError::Exhausted(failures).into())
}

/// Like [`extract_html`], for raw bytes in an unknown encoding.
///
/// The charset is taken from `<meta>` declarations, falling back to UTF-8.
/// Invalid sequences become U+FFFD.
///
/// # Errors
///
/// See [`extract_html`].
pub fn extract_bytes(html: &[u8], url: &str, options: &Options) -> Result<ExtractedArticle> {
    extract_html(&encoding::decode_body(html, None), url, options)
}

/// Run one strategy with no fallback.
///
/// # Errors
///
/// See [`extract_html`].
pub fn extract_with_strategy(
    html: &str,
    url: &str,
    strategy: ExtractionStrategy,
    options: &Options,
) -> Result<ExtractedArticle> {
    let url = url_utils::parse_http_url(url).ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;
    Ok(strategy.attempt(&SourceDocument::from_html(url, html), options)?)
}
