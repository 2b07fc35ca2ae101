//! Site profiler.
//!
//! Turns a fetched page into a [`SiteProfile`]: a complexity score, a platform
//! classification and a recommended extraction strategy. Feature collection
//! touches the DOM; scoring and recommendation are pure functions over
//! [`StructuralFeatures`] so they can be tested without any HTML.

use std::fmt;

use crate::dom::{self, Document};
use crate::extractor::wordpress;
use crate::patterns::{AD_CLASS, AD_NETWORK_MARKERS, CANDIDATE_BLOCK_SELECTOR, GRID_FLEX};
use crate::result::{SourceDocument, StrategyUsed};
use crate::url_utils::normalized_host;

/// Platform classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Ordinary hand-built or framework site.
    Generic,
    /// Recognized CMS (WordPress, Blogger and similar).
    KnownCms,
    /// Nothing to judge by (no visible text).
    Unknown,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Generic => "generic",
            Self::KnownCms => "known-cms",
            Self::Unknown => "unknown",
        })
    }
}

/// Tunable thresholds for complexity scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileThresholds {
    /// More `<div>` elements than this marks a complex layout.
    ///
    /// Default: `100`
    pub complex_div_count: usize,

    /// More `<script>` elements than this marks a complex layout.
    ///
    /// Default: `15`
    pub complex_script_count: usize,

    /// Each of div/section/article with more occurrences than this adds a nesting level.
    ///
    /// Default: `50`
    pub nesting_element_count: usize,

    /// Nesting level at which a complex layout is routed to `extract`.
    ///
    /// Default: `2`
    pub min_nesting_level: usize,

    /// Distinct ad-network markers that count as a strong ad signal.
    ///
    /// Default: `3`
    pub strong_ad_markers: usize,

    /// Ad-classed containers that count as a strong ad signal.
    ///
    /// Default: `8`
    pub strong_ad_containers: usize,

    /// Complexity score at or above which `extract` is recommended.
    ///
    /// Default: `3.0`
    pub extract_score: f64,

    /// Hosts that always get `extract` (without `www.`).
    ///
    /// Default: therecord.media, theverge.com, wired.com, securityboulevard.com
    pub extract_hosts: Vec<String>,
}

impl Default for ProfileThresholds {
    fn default() -> Self {
        Self {
            complex_div_count: 100,
            complex_script_count: 15,
            nesting_element_count: 50,
            min_nesting_level: 2,
            strong_ad_markers: 3,
            strong_ad_containers: 8,
            extract_score: 3.0,
            extract_hosts: ["therecord.media", "theverge.com", "wired.com", "securityboulevard.com"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Structural signals collected from one page.
#[derive(Debug, Clone, Default, PartialEq)]
#[allow(clippy::struct_excessive_bools)]
pub struct StructuralFeatures {
    /// Number of `<div>` elements.
    pub div_count: usize,
    /// Number of `<section>` elements.
    pub section_count: usize,
    /// Number of `<article>` elements.
    pub article_count: usize,
    /// Number of `<script>` elements.
    pub script_count: usize,
    /// Bytes inside `<script>` and `<style>` elements.
    pub script_style_bytes: usize,
    /// Bytes of visible body text.
    pub text_bytes: usize,
    /// Grid or flex layout declared anywhere in the page.
    pub uses_grid_or_flex: bool,
    /// Distinct ad-network markers found in the markup.
    pub ad_network_markers: usize,
    /// Elements whose class/id looks like an ad container.
    pub ad_container_count: usize,
    /// CMS fingerprint present.
    pub is_cms: bool,
    /// Normalized host of the page.
    pub host: Option<String>,
}

impl StructuralFeatures {
    /// Script and style bytes per visible text byte.
    #[must_use]
    pub fn script_ratio(&self) -> f64 {
        if self.text_bytes == 0 {
            return if self.script_style_bytes == 0 { 0.0 } else { f64::INFINITY };
        }
        self.script_style_bytes as f64 / self.text_bytes as f64
    }

    /// Grid/flex layout or too many divs or scripts.
    #[must_use]
    pub fn is_complex_layout(&self, thresholds: &ProfileThresholds) -> bool {
        self.uses_grid_or_flex
            || self.div_count > thresholds.complex_div_count
            || self.script_count > thresholds.complex_script_count
    }

    /// Number of container kinds (div, section, article) that occur more
    /// often than the nesting threshold.
    #[must_use]
    pub fn nesting_level(&self, thresholds: &ProfileThresholds) -> usize {
        [self.div_count, self.section_count, self.article_count]
            .into_iter()
            .filter(|&count| count > thresholds.nesting_element_count)
            .count()
    }

    /// Ad markers or containers at or above the strong-signal thresholds.
    #[must_use]
    pub fn has_strong_ad_signal(&self, thresholds: &ProfileThresholds) -> bool {
        self.ad_network_markers >= thresholds.strong_ad_markers
            || self.ad_container_count >= thresholds.strong_ad_containers
    }
}

/// Profile of one fetched page. Advisory input to strategy selection.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteProfile {
    /// Weighted complexity score (higher is messier).
    pub complexity_score: f64,
    /// Platform classification.
    pub detected_platform: Platform,
    /// Strategy the profiler would pick in `auto` mode.
    pub recommended_strategy: StrategyUsed,
    /// Signals the score was computed from.
    pub features: StructuralFeatures,
}

/// Collect structural signals from raw HTML.
#[must_use]
pub fn collect_features(html: &str, host: Option<String>) -> StructuralFeatures {
    let doc = Document::from(html);
    let lower = html.to_ascii_lowercase();

    let script_style_bytes = doc
        .select("script, style")
        .iter()
        .map(|sel| dom::text_content(&sel).len())
        .sum();

    let ad_container_count = doc
        .select(CANDIDATE_BLOCK_SELECTOR)
        .iter()
        .filter(|sel| AD_CLASS.is_match(&dom::class_and_id(sel)))
        .count();

    let mut features = StructuralFeatures {
        div_count: doc.select("div").length(),
        section_count: doc.select("section").length(),
        article_count: doc.select("article").length(),
        script_count: doc.select("script").length(),
        script_style_bytes,
        text_bytes: 0,
        uses_grid_or_flex: GRID_FLEX.is_match(html),
        ad_network_markers: AD_NETWORK_MARKERS.iter().filter(|m| lower.contains(*m)).count(),
        ad_container_count,
        is_cms: wordpress::is_cms_page(html),
        host,
    };

    dom::remove_all(&doc, "script, style, noscript, template");
    features.text_bytes = dom::normalized_text(&doc.select("body")).len();
    features
}

/// Weighted complexity score. Pure.
///
/// Contributions: complex layout 1.0, each nesting level 1.0, script ratio up
/// to 1.0, each distinct ad network 0.5 (max 2.0), each ad container 0.1
/// (max 1.0), CMS fingerprint 0.5.
#[must_use]
pub fn complexity_score(features: &StructuralFeatures, thresholds: &ProfileThresholds) -> f64 {
    let mut score = 0.0;
    if features.is_complex_layout(thresholds) {
        score += 1.0;
    }
    score += features.nesting_level(thresholds) as f64;
    score += features.script_ratio().min(3.0) / 3.0;
    score += features.ad_network_markers.min(4) as f64 * 0.5;
    score += features.ad_container_count.min(10) as f64 * 0.1;
    if features.is_cms {
        score += 0.5;
    }
    score
}

/// Platform classification. Pure.
#[must_use]
pub const fn classify_platform(features: &StructuralFeatures) -> Platform {
    if features.is_cms {
        Platform::KnownCms
    } else if features.text_bytes == 0 {
        Platform::Unknown
    } else {
        Platform::Generic
    }
}

/// Map structural features to a strategy tag. Pure.
#[must_use]
pub fn recommend(features: &StructuralFeatures, thresholds: &ProfileThresholds) -> StrategyUsed {
    let hard_site = features
        .host
        .as_deref()
        .is_some_and(|host| thresholds.extract_hosts.iter().any(|h| host == h || host.ends_with(&format!(".{h}"))));

    let extract = features.is_cms
        || hard_site
        || (features.is_complex_layout(thresholds) && features.nesting_level(thresholds) >= thresholds.min_nesting_level)
        || features.has_strong_ad_signal(thresholds)
        || complexity_score(features, thresholds) >= thresholds.extract_score;

    if extract {
        StrategyUsed::Extract
    } else {
        StrategyUsed::Minimal
    }
}

/// Profile a fetched page.
#[must_use]
pub fn profile(source: &SourceDocument, thresholds: &ProfileThresholds) -> SiteProfile {
    let features = collect_features(&source.raw_html, normalized_host(&source.url));
    SiteProfile {
        complexity_score: complexity_score(&features, thresholds),
        detected_platform: classify_platform(&features),
        recommended_strategy: recommend(&features, thresholds),
        features,
    }
}
