//! Connector configuration.
//!
//! Values come from three layers, later ones winning: built-in defaults, a
//! YAML file (`platform`, `connector` and `logging` sections) and environment
//! variables. Connector keys are read from `CONNECTOR_<KEY>` or plain `<KEY>`
//! (`WAIT_TIME`, `PDF_IMAGE_QUALITY`, ...); platform keys from `OPENCTI_URL`
//! and `OPENCTI_TOKEN`.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::logging::{LogFormat, LoggingConfig};
use crate::options::{Options, StrategyMode};
use crate::pipeline::MarkConfig;
use crate::platform::ReportFilter;

/// Default accepted report types.
pub const DEFAULT_TARGET_REPORT_TYPES: &[&str] = &["external-import", "threat-report", "rss-feed", "rss", "rss-report"];

/// Platform connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Base URL of the platform.
    pub url: String,
    /// API token.
    pub token: String,
    /// Per-request timeout in seconds.
    pub request_timeout: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            request_timeout: 300,
        }
    }
}

/// Connector behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ConnectorConfig {
    /// Seconds between poll cycles.
    pub wait_time: u64,
    /// Report types eligible for enrichment.
    pub target_report_types: Vec<String>,
    /// Ignore `target_report_types` and accept every report.
    pub process_all_reports: bool,
    /// Processing mark label.
    pub processed_label: String,
    /// Color for a newly created mark label.
    pub processed_label_color: String,
    /// Paginated full-page layout instead of a single column.
    pub preserve_original_layout: bool,
    /// Embed images in the PDF.
    pub include_images_in_pdf: bool,
    /// JPEG quality for embedded images, 1-100.
    pub pdf_image_quality: u32,
    /// Maximum embedded images per PDF.
    pub max_images_in_pdf: usize,
    /// `extract`, `minimal` or `auto`.
    pub ad_removal_strategy: String,
    /// Verbose logging.
    pub debug_mode: bool,
    /// Work through existing reports before polling.
    pub process_all_on_start: bool,
    /// Backlog bound, 0 for unbounded.
    pub max_reports_on_start: usize,
    /// PDF engine binary.
    pub wkhtmltopdf_path: PathBuf,
    /// Command-line fetch tool.
    pub wget_path: PathBuf,
    /// Headless browser binary, `None` disables the browser fetch.
    pub browser_path: Option<PathBuf>,
    /// Parent of render and download workspaces, `None` for the system temp dir.
    pub scratch_dir: Option<PathBuf>,
    /// Direct fetch timeout in seconds.
    pub direct_timeout: u64,
    /// Command-line fetch timeout in seconds.
    pub command_line_timeout: u64,
    /// Browser fetch timeout in seconds.
    pub browser_timeout: u64,
    /// Per-image download timeout in seconds.
    pub image_timeout: u64,
    /// PDF render timeout in seconds.
    pub render_timeout: u64,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        let options = Options::default();
        Self {
            wait_time: 60,
            target_report_types: DEFAULT_TARGET_REPORT_TYPES.iter().map(ToString::to_string).collect(),
            process_all_reports: true,
            processed_label: "rss-enhanced".to_string(),
            processed_label_color: "#ff9900".to_string(),
            preserve_original_layout: options.preserve_original_layout,
            include_images_in_pdf: options.include_images,
            pdf_image_quality: u32::from(options.image_quality),
            max_images_in_pdf: options.max_images,
            ad_removal_strategy: options.ad_removal_strategy.as_str().to_string(),
            debug_mode: false,
            process_all_on_start: false,
            max_reports_on_start: 100,
            wkhtmltopdf_path: options.renderer_path,
            wget_path: options.wget_path,
            browser_path: options.browser_path,
            scratch_dir: options.scratch_dir,
            direct_timeout: options.direct_timeout.as_secs(),
            command_line_timeout: options.command_line_timeout.as_secs(),
            browser_timeout: options.browser_timeout.as_secs(),
            image_timeout: options.image_timeout.as_secs(),
            render_timeout: options.render_timeout.as_secs(),
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Platform connection (`opencti` is accepted as the section name too).
    #[serde(alias = "opencti")]
    pub platform: PlatformConfig,
    /// Connector behavior.
    pub connector: ConnectorConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load from an optional YAML file, apply process environment overrides
    /// and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Parse YAML text. An empty document yields the defaults.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Apply overrides from `vars` (name, value pairs).
    pub fn apply_env<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();
        let lookup = |names: &[&str]| -> Option<(String, String)> {
            names.iter().find_map(|name| {
                vars.iter()
                    .find(|(key, _)| key == name)
                    .map(|(key, value)| (key.clone(), value.trim().to_string()))
            })
        };
        let connector = |key: &str| lookup(&[&format!("CONNECTOR_{key}"), key]);

        if let Some((_, v)) = lookup(&["OPENCTI_URL"]) {
            self.platform.url = v;
        }
        if let Some((_, v)) = lookup(&["OPENCTI_TOKEN"]) {
            self.platform.token = v;
        }

        let c = &mut self.connector;
        if let Some(kv) = connector("WAIT_TIME") {
            c.wait_time = parse_value(kv)?;
        }
        if let Some((_, v)) = connector("TARGET_REPORT_TYPES") {
            c.target_report_types = split_list(&v);
        }
        if let Some(kv) = connector("PROCESS_ALL_REPORTS") {
            c.process_all_reports = parse_bool(kv)?;
        }
        if let Some((_, v)) = connector("PROCESSED_LABEL") {
            c.processed_label = v;
        }
        if let Some((_, v)) = connector("PROCESSED_LABEL_COLOR") {
            c.processed_label_color = v;
        }
        if let Some(kv) = connector("PRESERVE_ORIGINAL_LAYOUT") {
            c.preserve_original_layout = parse_bool(kv)?;
        }
        if let Some(kv) = connector("INCLUDE_IMAGES_IN_PDF") {
            c.include_images_in_pdf = parse_bool(kv)?;
        }
        if let Some(kv) = connector("PDF_IMAGE_QUALITY") {
            c.pdf_image_quality = parse_value(kv)?;
        }
        if let Some(kv) = connector("MAX_IMAGES_IN_PDF") {
            c.max_images_in_pdf = parse_value(kv)?;
        }
        if let Some((_, v)) = connector("AD_REMOVAL_STRATEGY") {
            c.ad_removal_strategy = v;
        }
        if let Some(kv) = connector("DEBUG_MODE") {
            c.debug_mode = parse_bool(kv)?;
        }
        if let Some(kv) = connector("PROCESS_ALL_ON_START") {
            c.process_all_on_start = parse_bool(kv)?;
        }
        if let Some(kv) = connector("MAX_REPORTS_ON_START") {
            c.max_reports_on_start = parse_value(kv)?;
        }
        if let Some((_, v)) = connector("WKHTMLTOPDF_PATH") {
            c.wkhtmltopdf_path = PathBuf::from(v);
        }
        if let Some((_, v)) = connector("WGET_PATH") {
            c.wget_path = PathBuf::from(v);
        }
        if let Some((_, v)) = connector("BROWSER_PATH") {
            c.browser_path = (!v.is_empty()).then(|| PathBuf::from(v));
        }
        if let Some((_, v)) = connector("SCRATCH_DIR") {
            c.scratch_dir = (!v.is_empty()).then(|| PathBuf::from(v));
        }

        if let Some((_, v)) = lookup(&["LOG_LEVEL"]) {
            self.logging.level = v;
        }
        if let Some((key, v)) = lookup(&["LOG_FORMAT"]) {
            self.logging.format = v.parse::<LogFormat>().map_err(|_| ConfigError::Env { key, value: v })?;
        }
        Ok(())
    }

    /// Check every value and report all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();
        let c = &self.connector;

        if self.platform.url.trim().is_empty() {
            problems.push("platform.url is required".to_string());
        } else if url::Url::parse(&self.platform.url).is_err() {
            problems.push(format!("platform.url is not a valid URL: {}", self.platform.url));
        }
        if self.platform.token.trim().is_empty() {
            problems.push("platform.token is required".to_string());
        }
        if !(1..=100).contains(&c.pdf_image_quality) {
            problems.push(format!("connector.pdf_image_quality must be 1-100, got {}", c.pdf_image_quality));
        }
        if let Err(e) = StrategyMode::from_str(&c.ad_removal_strategy) {
            problems.push(format!("connector.ad_removal_strategy: {e}"));
        }
        if !is_hex_color(&c.processed_label_color) {
            problems.push(format!(
                "connector.processed_label_color must be #rrggbb, got {}",
                c.processed_label_color
            ));
        }
        if c.processed_label.trim().is_empty() {
            problems.push("connector.processed_label must not be empty".to_string());
        }
        if !c.process_all_reports && c.target_report_types.is_empty() {
            problems.push("connector.target_report_types is empty and process_all_reports is off".to_string());
        }
        if c.wait_time == 0 {
            problems.push("connector.wait_time must be at least 1 second".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    /// Pipeline options for these settings.
    #[must_use]
    pub fn options(&self) -> Options {
        let c = &self.connector;
        let defaults = Options::default();
        Options {
            ad_removal_strategy: c.ad_removal_strategy.parse().unwrap_or_default(),
            preserve_original_layout: c.preserve_original_layout,
            include_images: c.include_images_in_pdf,
            image_quality: u8::try_from(c.pdf_image_quality.clamp(1, 100)).unwrap_or(defaults.image_quality),
            max_images: c.max_images_in_pdf,
            direct_timeout: Duration::from_secs(c.direct_timeout),
            command_line_timeout: Duration::from_secs(c.command_line_timeout),
            browser_timeout: Duration::from_secs(c.browser_timeout),
            image_timeout: Duration::from_secs(c.image_timeout),
            render_timeout: Duration::from_secs(c.render_timeout),
            wget_path: c.wget_path.clone(),
            browser_path: c.browser_path.clone(),
            renderer_path: c.wkhtmltopdf_path.clone(),
            scratch_dir: c.scratch_dir.clone(),
            ..defaults
        }
    }

    /// Report filter: target types, excluding reports that carry the mark.
    #[must_use]
    pub fn report_filter(&self) -> ReportFilter {
        ReportFilter::new(
            &self.connector.target_report_types,
            self.connector.process_all_reports,
            Some(self.connector.processed_label.clone()),
        )
    }

    /// Processing mark.
    #[must_use]
    pub fn mark(&self) -> MarkConfig {
        MarkConfig {
            label: self.connector.processed_label.clone(),
            color: self.connector.processed_label_color.clone(),
        }
    }

    /// Logging settings with `debug_mode` applied.
    #[must_use]
    pub fn effective_logging(&self) -> LoggingConfig {
        let mut logging = self.logging.clone();
        if self.connector.debug_mode {
            logging.level = "debug".to_string();
        }
        logging
    }
}

fn parse_value<T: FromStr>((key, value): (String, String)) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Env { key, value })
}

/// `true/yes/1/on` and `false/no/0/off`, case-insensitive.
fn parse_bool((key, value): (String, String)) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Env { key, value }),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7 && value.starts_with('#') && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    fn valid() -> Config {
        let mut config = Config::default();
        config.platform.url = "http://opencti:8080".to_string();
        config.platform.token = "token".to_string();
        config
    }

    #[test]
    fn defaults_match_documented_values() {
        let c = ConnectorConfig::default();
        assert_eq!(c.wait_time, 60);
        assert_eq!(c.processed_label, "rss-enhanced");
        assert_eq!(c.pdf_image_quality, 85);
        assert_eq!(c.max_images_in_pdf, 20);
        assert_eq!(c.max_reports_on_start, 100);
        assert!(c.process_all_reports);
        assert!(!c.process_all_on_start);
        assert_eq!(c.target_report_types.len(), 5);
    }

    #[test]
    fn yaml_sections_are_read_with_defaults_for_missing_keys() {
        let config = Config::from_yaml(
            "opencti:\n  url: http://opencti:8080\n  token: abc\nconnector:\n  wait_time: 30\n  ad_removal_strategy: minimal\n",
        )
        .unwrap();

        assert_eq!(config.platform.token, "abc");
        assert_eq!(config.connector.wait_time, 30);
        assert_eq!(config.connector.processed_label_color, "#ff9900");
        assert_eq!(config.options().ad_removal_strategy, StrategyMode::Minimal);
    }

    #[test]
    fn environment_overrides_yaml() {
        let mut config = Config::from_yaml("connector:\n  wait_time: 30\n").unwrap();
        config
            .apply_env(env(&[
                ("CONNECTOR_WAIT_TIME", "90"),
                ("WAIT_TIME", "10"),
                ("TARGET_REPORT_TYPES", "threat-report, rss ,"),
                ("INCLUDE_IMAGES_IN_PDF", "off"),
                ("PROCESS_ALL_ON_START", "Yes"),
                ("OPENCTI_URL", "http://platform"),
            ]))
            .unwrap();

        assert_eq!(config.connector.wait_time, 90);
        assert_eq!(config.connector.target_report_types, vec!["threat-report".to_string(), "rss".to_string()]);
        assert!(!config.connector.include_images_in_pdf);
        assert!(config.connector.process_all_on_start);
        assert_eq!(config.platform.url, "http://platform");
    }

    #[test]
    fn bad_env_value_names_the_key() {
        let mut config = Config::default();
        let err = config.apply_env(env(&[("PDF_IMAGE_QUALITY", "high")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref key, .. } if key == "PDF_IMAGE_QUALITY"));

        let err = config.apply_env(env(&[("DEBUG_MODE", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { .. }));
    }

    #[test]
    fn validate_collects_every_problem() {
        let mut config = Config::default();
        config.connector.pdf_image_quality = 0;
        config.connector.ad_removal_strategy = "aggressive".to_string();
        config.connector.processed_label_color = "orange".to_string();

        let ConfigError::Invalid(problems) = config.validate().unwrap_err() else {
            panic!("expected Invalid");
        };
        assert_eq!(problems.len(), 5);
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn options_follow_connector_settings() {
        let mut config = valid();
        config.connector.preserve_original_layout = false;
        config.connector.pdf_image_quality = 60;
        config.connector.render_timeout = 10;
        config.apply_env(env(&[("CONNECTOR_SCRATCH_DIR", "/var/tmp/enhancer")])).unwrap();

        let options = config.options();

        assert!(!options.preserve_original_layout);
        assert_eq!(options.image_quality, 60);
        assert_eq!(options.render_timeout, Duration::from_secs(10));
        assert_eq!(options.min_content_length, 100);
        assert_eq!(options.scratch_dir.as_deref(), Some(std::path::Path::new("/var/tmp/enhancer")));
    }

    #[test]
    fn debug_mode_raises_log_level() {
        let mut config = valid();
        config.connector.debug_mode = true;
        assert_eq!(config.effective_logging().level, "debug");
    }
}
