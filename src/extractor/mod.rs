//! Article extraction.
//!
//! Two strategies turn a fetched page into an [`ExtractedArticle`]:
//!
//! - `readability`: rebuilds a minimal document from the detected main content.
//! - `minimal`: keeps the original DOM and removes a denylist of ads, trackers,
//!   overlays and unsafe elements.
//!
//! Both end in [`finish`], which enforces the invariants every article must
//! satisfy: no script, style or iframe elements, absolute image and link URLs,
//! and at least `min_content_length` chars of visible text.
//!
//! # Module Structure
//!
//! - `readability`: the `extract` strategy
//! - `minimal`: the `minimal` strategy
//! - `images`: lazy-image resolution and image URL discovery
//! - `metadata`: title, byline and publication date from the page head
//! - `wordpress`: CMS detection and entry isolation

pub mod images;
pub mod metadata;
pub mod minimal;
pub mod readability;
pub mod wordpress;

use tracing::debug;
use url::Url;

use crate::dom::{self, Document, Selection};
use crate::error::ExtractionError;
use crate::options::{Options, StrategyMode};
use crate::patterns::ALWAYS_REMOVED_SELECTOR;
use crate::profiler::{Platform, SiteProfile};
use crate::result::{ExtractedArticle, SourceDocument, StrategyUsed};
use crate::url_utils::resolve;

use metadata::PageMetadata;

/// A content extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionStrategy {
    /// Readability rebuild of the main content.
    Extract,
    /// Denylist cleanup of the original DOM.
    Minimal,
}

impl ExtractionStrategy {
    /// Name recorded in strategy chains.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.tag().as_str()
    }

    /// Tag carried on the produced article.
    #[must_use]
    pub const fn tag(self) -> StrategyUsed {
        match self {
            Self::Extract => StrategyUsed::Extract,
            Self::Minimal => StrategyUsed::Minimal,
        }
    }

    /// The other strategy, used as the single fallback.
    #[must_use]
    pub const fn alternate(self) -> Self {
        match self {
            Self::Extract => Self::Minimal,
            Self::Minimal => Self::Extract,
        }
    }

    /// Run this strategy against a fetched page.
    ///
    /// # Errors
    ///
    /// Returns an [`ExtractionError`] when the strategy produces nothing usable.
    pub fn attempt(self, source: &SourceDocument, options: &Options) -> Result<ExtractedArticle, ExtractionError> {
        debug!(strategy = self.name(), url = %source.url, "extraction attempt");
        match self {
            Self::Extract => readability::extract(source, options),
            Self::Minimal => minimal::extract(source, options),
        }
    }
}

impl From<StrategyUsed> for ExtractionStrategy {
    fn from(tag: StrategyUsed) -> Self {
        match tag {
            StrategyUsed::Extract => Self::Extract,
            StrategyUsed::Minimal => Self::Minimal,
        }
    }
}

/// Strategy order for a page: the primary choice followed by its alternate.
///
/// In `auto` mode the profile's recommendation is primary, and CMS pages
/// always start with `extract`. Explicit modes are honored as given.
#[must_use]
pub fn plan(mode: StrategyMode, profile: &SiteProfile) -> [ExtractionStrategy; 2] {
    let primary = match mode {
        StrategyMode::Extract => ExtractionStrategy::Extract,
        StrategyMode::Minimal => ExtractionStrategy::Minimal,
        StrategyMode::Auto if profile.detected_platform == Platform::KnownCms => ExtractionStrategy::Extract,
        StrategyMode::Auto => profile.recommended_strategy.into(),
    };
    [primary, primary.alternate()]
}

/// Run a single strategy. See [`ExtractionStrategy::attempt`].
///
/// # Errors
///
/// Returns an [`ExtractionError`] when the strategy produces nothing usable.
pub fn extract(
    source: &SourceDocument,
    strategy: ExtractionStrategy,
    options: &Options,
) -> Result<ExtractedArticle, ExtractionError> {
    strategy.attempt(source, options)
}

/// Absolutize every `a[href]` against `base`. Unresolvable links lose their href.
pub(crate) fn absolutize_links(doc: &Document, base: &Url) {
    for node in doc.select("a[href]").nodes() {
        let link = Selection::from(*node);
        match dom::get_attribute(&link, "href").and_then(|href| resolve(&href, base)) {
            Some(url) if !url.starts_with("data:") => dom::set_attribute(&link, "href", &url),
            _ => dom::remove_attribute(&link, "href"),
        }
    }
}

/// Final pass shared by both strategies.
///
/// `doc` holds the article body inside `<body>`; its title and metadata come
/// from the source page.
pub(crate) fn finish(
    doc: &Document,
    base: &Url,
    title: String,
    meta: &PageMetadata,
    strategy: StrategyUsed,
    source: &SourceDocument,
    options: &Options,
) -> Result<ExtractedArticle, ExtractionError> {
    dom::remove_all(doc, ALWAYS_REMOVED_SELECTOR);
    dom::strip_event_handlers(doc);
    absolutize_links(doc, base);
    let image_urls = images::normalize_images(doc, base);

    let length = dom::body_text_len(doc);
    if length == 0 {
        return Err(ExtractionError::NoContent);
    }
    if length < options.min_content_length {
        return Err(ExtractionError::TooShort {
            strategy: strategy.as_str(),
            length,
            minimum: options.min_content_length,
        });
    }

    debug!(strategy = %strategy, length, images = image_urls.len(), "article extracted");

    Ok(ExtractedArticle {
        title,
        body_html: dom::inner_html(&doc.select("body")).trim().to_string(),
        image_urls,
        strategy_used: strategy,
        byline: meta.author.clone(),
        published: meta.published,
        source_url: source.url.clone(),
        cms_theme: wordpress::is_cms_page(&source.raw_html)
            .then(|| wordpress::theme_name(&source.raw_html))
            .flatten(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiler::StructuralFeatures;

    fn profile(platform: Platform, recommended: StrategyUsed) -> SiteProfile {
        SiteProfile {
            complexity_score: 0.0,
            detected_platform: platform,
            recommended_strategy: recommended,
            features: StructuralFeatures::default(),
        }
    }

    #[test]
    fn auto_follows_recommendation() {
        let p = profile(Platform::Generic, StrategyUsed::Minimal);
        assert_eq!(plan(StrategyMode::Auto, &p), [ExtractionStrategy::Minimal, ExtractionStrategy::Extract]);

        let p = profile(Platform::Generic, StrategyUsed::Extract);
        assert_eq!(plan(StrategyMode::Auto, &p), [ExtractionStrategy::Extract, ExtractionStrategy::Minimal]);
    }

    #[test]
    fn auto_forces_extract_on_cms() {
        let p = profile(Platform::KnownCms, StrategyUsed::Minimal);
        assert_eq!(plan(StrategyMode::Auto, &p)[0], ExtractionStrategy::Extract);
    }

    #[test]
    fn explicit_mode_is_primary() {
        let p = profile(Platform::KnownCms, StrategyUsed::Extract);
        assert_eq!(plan(StrategyMode::Minimal, &p), [ExtractionStrategy::Minimal, ExtractionStrategy::Extract]);
        assert_eq!(plan(StrategyMode::Extract, &p)[1], ExtractionStrategy::Minimal);
    }

    #[test]
    fn links_are_absolutized() {
        let doc = Document::from(r#"<body><a href="/a">a</a><a href="javascript:x()">b</a><a href="https://o.test/c">c</a></body>"#);
        let base = Url::parse("https://site.test/post/1").unwrap();

        absolutize_links(&doc, &base);

        let hrefs: Vec<_> = doc.select("a[href]").iter().filter_map(|a| dom::get_attribute(&a, "href")).collect();
        assert_eq!(hrefs, vec!["https://site.test/a".to_string(), "https://o.test/c".to_string()]);
    }
}
