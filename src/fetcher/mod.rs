//! Network fetcher.
//!
//! Retrieves the raw HTML of an article page with three transport strategies
//! tried in order:
//!
//! 1. [`FetchMethod::Direct`]: `reqwest` GET with browser-like headers.
//! 2. [`FetchMethod::CommandLine`]: a wget-compatible tool writing to a scratch file.
//! 3. [`FetchMethod::Browser`]: a headless browser dumping the rendered DOM.
//!
//! The first body that clears the sparse-content threshold wins. When none
//! does, the longest body seen is returned with `degraded` set. Only when no
//! method produced any content is a [`FetchError`] returned.

pub mod heuristics;

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::encoding::decode_body;
use crate::error::FetchError;
use crate::options::Options;
use crate::process::{run_bounded, RunError, Workspace};
use crate::result::SourceDocument;
use crate::url_utils::parse_http_url;

use heuristics::{assess, BodyAssessment};

/// Bodies smaller than this from the command-line tool count as failures.
const MIN_DOWNLOAD_BYTES: usize = 100;

/// Transport strategy used to retrieve a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchMethod {
    /// Plain HTTP client request.
    Direct,
    /// Command-line download tool.
    CommandLine,
    /// Headless browser DOM dump (runs page scripts).
    Browser,
}

impl FetchMethod {
    /// Attempt order.
    pub const ORDER: [Self; 3] = [Self::Direct, Self::CommandLine, Self::Browser];

    /// Lowercase name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::CommandLine => "command-line",
            Self::Browser => "browser",
        }
    }

    /// Run this strategy once against `url`.
    pub async fn attempt(self, fetcher: &Fetcher, url: &Url, timeout: Duration) -> Result<FetchedBody, FetchError> {
        match self {
            Self::Direct => fetcher.fetch_direct(url, timeout).await,
            Self::CommandLine => fetcher.fetch_command_line(url, timeout).await,
            Self::Browser => fetcher.fetch_browser(url, timeout).await,
        }
    }
}

impl fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body returned by one successful strategy attempt.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    /// Final URL, after redirects when the transport reports them.
    pub url: Url,
    /// Decoded HTML.
    pub html: String,
}

struct Candidate {
    method: FetchMethod,
    body: FetchedBody,
    assessment: BodyAssessment,
}

/// Multi-strategy page fetcher.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    options: Options,
}

impl Fetcher {
    /// Build a fetcher with its HTTP client.
    pub fn new(options: &Options) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert("upgrade-insecure-requests", HeaderValue::from_static("1"));

        let client = reqwest::Client::builder()
            .user_agent(&options.user_agent)
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::limited(10))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client, options: options.clone() })
    }

    /// Fetch `url`, falling back through [`FetchMethod::ORDER`].
    ///
    /// # Errors
    ///
    /// [`FetchError::Exhausted`] when no method produced content,
    /// [`FetchError::Workspace`] as soon as a scratch directory cannot be created.
    pub async fn fetch(&self, url: &str) -> Result<SourceDocument, FetchError> {
        let url = parse_http_url(url).ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;
        let deadline = Instant::now() + self.options.fetch_budget;
        let threshold = self.options.sparse_threshold;

        let mut failures = Vec::new();
        let mut best: Option<Candidate> = None;

        for method in FetchMethod::ORDER {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(url = %url, method = %method, "fetch budget exhausted");
                break;
            }
            let timeout = self.timeout_for(method).min(remaining);

            let body = match method.attempt(self, &url, timeout).await {
                Ok(body) => body,
                Err(err @ FetchError::Workspace(_)) => return Err(err),
                Err(err) => {
                    warn!(url = %url, method = %method, error = %err, "fetch attempt failed");
                    failures.push(err);
                    continue;
                }
            };

            let assessment = assess(&body.html, threshold);
            if assessment.is_sufficient(threshold) {
                info!(url = %url, method = %method, text_len = assessment.text_len, "fetched page");
                return Ok(source_document(method, body, false));
            }

            debug!(
                url = %url,
                method = %method,
                text_len = assessment.text_len,
                needs_script = assessment.needs_script,
                blocked = assessment.blocked,
                "body below threshold; trying next method"
            );
            let longer = best
                .as_ref()
                .is_none_or(|b| (assessment.text_len, body.html.len()) > (b.assessment.text_len, b.body.html.len()));
            if longer {
                best = Some(Candidate { method, body, assessment });
            }
        }

        match best {
            Some(candidate) => {
                warn!(
                    url = %url,
                    method = %candidate.method,
                    text_len = candidate.assessment.text_len,
                    "no method cleared the sparse threshold; using longest body"
                );
                Ok(source_document(candidate.method, candidate.body, true))
            }
            None => Err(FetchError::Exhausted { url: url.to_string(), attempts: failures }),
        }
    }

    fn timeout_for(&self, method: FetchMethod) -> Duration {
        match method {
            FetchMethod::Direct => self.options.direct_timeout,
            FetchMethod::CommandLine => self.options.command_line_timeout,
            FetchMethod::Browser => self.options.browser_timeout,
        }
    }

    async fn fetch_direct(&self, url: &Url, timeout: Duration) -> Result<FetchedBody, FetchError> {
        let fail = |reason: String| FetchError::Attempt { method: FetchMethod::Direct.as_str(), reason };

        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {status}")));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(|e| fail(e.to_string()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(fail("empty body".to_string()));
        }

        let html = decode_body(&bytes, content_type.as_deref());
        if assess(&html, self.options.sparse_threshold).blocked {
            return Err(fail("blocked by bot challenge".to_string()));
        }

        Ok(FetchedBody { url: final_url, html })
    }

    async fn fetch_command_line(&self, url: &Url, timeout: Duration) -> Result<FetchedBody, FetchError> {
        let method = FetchMethod::CommandLine.as_str();
        let fail = |reason: String| FetchError::Attempt { method, reason };

        let workspace = Workspace::new_in(self.options.scratch_dir.as_deref(), "enhancer-fetch-")
            .map_err(FetchError::Workspace)?;
        let output_path = workspace.file("page.html");

        let mut command = Command::new(&self.options.wget_path);
        command
            .arg(format!("--user-agent={}", self.options.user_agent))
            .arg(format!("--timeout={}", timeout.as_secs().max(1)))
            .args(["--tries=2", "--quiet", "-O"])
            .arg(&output_path)
            .arg(url.as_str());

        let output = run_bounded(command, timeout).await.map_err(|e| fail(e.to_string()))?;
        if !output.status.success() {
            return Err(fail(format!("exited with {}: {}", output.status, output.stderr_excerpt())));
        }

        let bytes = tokio::fs::read(&output_path).await.map_err(|e| fail(e.to_string()))?;
        if bytes.len() < MIN_DOWNLOAD_BYTES {
            return Err(fail(format!("download too small ({} bytes)", bytes.len())));
        }

        Ok(FetchedBody { url: url.clone(), html: decode_body(&bytes, None) })
    }

    async fn fetch_browser(&self, url: &Url, timeout: Duration) -> Result<FetchedBody, FetchError> {
        let method = FetchMethod::Browser.as_str();
        let fail = |reason: String| FetchError::Attempt { method, reason };

        let Some(browser) = &self.options.browser_path else {
            return Err(fail("no headless browser configured".to_string()));
        };

        let workspace = Workspace::new_in(self.options.scratch_dir.as_deref(), "enhancer-browser-")
            .map_err(FetchError::Workspace)?;
        let profile = workspace.subdir("profile").map_err(FetchError::Workspace)?;

        let mut command = Command::new(browser);
        command
            .args([
                "--headless=new",
                "--disable-gpu",
                "--no-sandbox",
                "--no-first-run",
                "--disable-dev-shm-usage",
                "--hide-scrollbars",
                "--virtual-time-budget=10000",
            ])
            .arg(format!("--user-agent={}", self.options.user_agent))
            .arg(format!("--user-data-dir={}", profile.display()))
            .arg("--dump-dom")
            .arg(url.as_str());

        let output = run_bounded(command, timeout).await.map_err(|e| match e {
            RunError::Timeout(t) => fail(format!("timed out after {t:?}")),
            other => fail(other.to_string()),
        })?;
        if !output.status.success() {
            return Err(fail(format!("exited with {}: {}", output.status, output.stderr_excerpt())));
        }
        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Err(fail("empty DOM dump".to_string()));
        }

        Ok(FetchedBody { url: url.clone(), html: decode_body(&output.stdout, Some("text/html; charset=utf-8")) })
    }
}

fn source_document(method: FetchMethod, body: FetchedBody, degraded: bool) -> SourceDocument {
    SourceDocument {
        url: body.url,
        raw_html: body.html,
        fetch_method_used: method,
        fetched_at: Utc::now(),
        degraded,
    }
}
