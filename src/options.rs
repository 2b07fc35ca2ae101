//! Tunable settings for the enrichment pipeline.
//!
//! The `Options` struct carries every threshold, timeout and tool path the
//! pipeline stages read. The connector builds one from [`crate::config::Config`];
//! library users can construct it directly.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::profiler::ProfileThresholds;

/// Browser-like user agent sent by the direct and command-line fetchers.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36";

/// Configured ad-removal strategy.
///
/// `Auto` defers to the site profiler's recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyMode {
    /// Always rebuild the article with the readability pass.
    Extract,
    /// Always clean the original DOM with the denylist.
    Minimal,
    /// Let the site profiler decide.
    #[default]
    Auto,
}

impl StrategyMode {
    /// Lowercase name as used in configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Minimal => "minimal",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "extract" => Ok(Self::Extract),
            "minimal" => Ok(Self::Minimal),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown ad removal strategy '{other}' (expected extract, minimal or auto)")),
        }
    }
}

/// Settings consumed by the pipeline stages.
///
/// All fields are public for easy configuration. Use `Default::default()`
/// for standard settings.
///
/// # Example
///
/// ```rust
/// use rs_report_enhancer::{Options, StrategyMode};
///
/// let options = Options {
///     ad_removal_strategy: StrategyMode::Extract,
///     max_images: 5,
///     ..Options::default()
/// };
/// assert_eq!(options.image_quality, 85);
/// ```
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct Options {
    /// Which extraction strategy to use.
    ///
    /// Default: `Auto`
    pub ad_removal_strategy: StrategyMode,

    /// Render the full paginated page instead of a simplified single column.
    ///
    /// Default: `true`
    pub preserve_original_layout: bool,

    /// Embed images in the PDF. When false every `<img>` is stripped.
    ///
    /// Default: `true`
    pub include_images: bool,

    /// JPEG quality applied when re-encoding images (1-100).
    ///
    /// Default: `85`
    pub image_quality: u8,

    /// Maximum number of images embedded per article. Excess images are
    /// dropped in document order.
    ///
    /// Default: `20`
    pub max_images: usize,

    /// Minimum body text length (chars) for an extraction to count as usable.
    ///
    /// Default: `100`
    pub min_content_length: usize,

    /// Body text length (chars) below which a fetched page counts as sparse.
    ///
    /// Default: `100`
    pub sparse_threshold: usize,

    /// Timeout for the direct HTTP fetch.
    ///
    /// Default: `30s`
    pub direct_timeout: Duration,

    /// Timeout for the command-line fetch tool.
    ///
    /// Default: `30s`
    pub command_line_timeout: Duration,

    /// Timeout for the headless browser DOM dump.
    ///
    /// Default: `45s`
    pub browser_timeout: Duration,

    /// Total wall-clock budget across all fetch strategies.
    ///
    /// Default: `120s`
    pub fetch_budget: Duration,

    /// Per-image download timeout.
    ///
    /// Default: `10s`
    pub image_timeout: Duration,

    /// Timeout for the PDF rendering engine.
    ///
    /// Default: `120s`
    pub render_timeout: Duration,

    /// User agent for the direct and command-line fetchers.
    ///
    /// Default: [`DEFAULT_USER_AGENT`]
    pub user_agent: String,

    /// Command-line fetch tool (wget compatible flags).
    ///
    /// Default: `wget`
    pub wget_path: PathBuf,

    /// Headless browser used for script-rendered pages (`--dump-dom`).
    /// `None` disables the browser strategy.
    ///
    /// Default: `Some("chromium")`
    pub browser_path: Option<PathBuf>,

    /// HTML to PDF engine (wkhtmltopdf compatible flags).
    ///
    /// Default: `/usr/bin/wkhtmltopdf`
    pub renderer_path: PathBuf,

    /// Parent directory for render and download workspaces. When it cannot
    /// be written the run stops.
    ///
    /// Default: `None` (system temp dir)
    pub scratch_dir: Option<PathBuf>,

    /// Maximum excerpt length in chars before truncation.
    ///
    /// Default: `90000`
    pub excerpt_limit: usize,

    /// Minimum visible-text to markup ratio for minimal output.
    ///
    /// Default: `0.05`
    pub minimal_min_text_ratio: f64,

    /// Maximum size in bytes of minimal output.
    ///
    /// Default: `500000`
    pub minimal_max_bytes: usize,

    /// Complexity thresholds used by the site profiler.
    pub profile_thresholds: ProfileThresholds,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ad_removal_strategy: StrategyMode::Auto,
            preserve_original_layout: true,
            include_images: true,
            image_quality: 85,
            max_images: 20,
            min_content_length: 100,
            sparse_threshold: 100,
            direct_timeout: Duration::from_secs(30),
            command_line_timeout: Duration::from_secs(30),
            browser_timeout: Duration::from_secs(45),
            fetch_budget: Duration::from_secs(120),
            image_timeout: Duration::from_secs(10),
            render_timeout: Duration::from_secs(120),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            wget_path: PathBuf::from("wget"),
            browser_path: Some(PathBuf::from("chromium")),
            renderer_path: PathBuf::from("/usr/bin/wkhtmltopdf"),
            scratch_dir: None,
            excerpt_limit: 90_000,
            minimal_min_text_ratio: 0.05,
            minimal_max_bytes: 500_000,
            profile_thresholds: ProfileThresholds::default(),
        }
    }
}
