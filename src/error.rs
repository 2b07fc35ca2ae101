//! Error types for rs-report-enhancer.
//!
//! Each pipeline stage has its own error enum so the orchestrator can log the
//! failing stage together with the root cause. [`Error`] wraps all of them.

use std::time::Duration;

/// Every transport strategy was exhausted without returning any content.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The URL could not be parsed or uses an unsupported scheme.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    Client(String),

    /// A single strategy failed. Carried inside [`FetchError::Exhausted`].
    #[error("{method} fetch failed: {reason}")]
    Attempt {
        /// Strategy name.
        method: &'static str,
        /// Underlying cause.
        reason: String,
    },

    /// A scratch directory for a download could not be created.
    #[error("Fetch workspace unavailable: {0}")]
    Workspace(#[source] std::io::Error),

    /// No strategy returned any content.
    #[error("All fetch strategies failed for {url}: {}", join_attempts(.attempts))]
    Exhausted {
        /// The URL that was requested.
        url: String,
        /// Per-strategy failures, in attempt order.
        attempts: Vec<FetchError>,
    },
}

fn join_attempts(attempts: &[FetchError]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Content extraction failed for one or both strategies.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The readability pass produced nothing usable.
    #[error("Readability extraction failed: {0}")]
    Readability(String),

    /// The extracted body is shorter than the configured minimum.
    #[error("{strategy} output too short: {length} chars (minimum {minimum})")]
    TooShort {
        /// Strategy that produced the body.
        strategy: &'static str,
        /// Body text length in chars.
        length: usize,
        /// Configured minimum.
        minimum: usize,
    },

    /// Minimal cleanup produced a document that fails structural validation.
    #[error("Minimal output rejected: {0}")]
    Rejected(String),

    /// No extractable content was found in the document.
    #[error("No extractable content found")]
    NoContent,

    /// Every strategy in the plan failed.
    #[error("All extraction strategies failed: {}", .0.join("; "))]
    Exhausted(Vec<String>),
}

/// Failure while downloading or re-encoding a single image.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// Download failed or returned a non-success status.
    #[error("Image download failed for {url}: {reason}")]
    Download {
        /// Image URL.
        url: String,
        /// Underlying cause.
        reason: String,
    },

    /// The payload could not be decoded or re-encoded.
    #[error("Image decode failed for {url}: {reason}")]
    Decode {
        /// Image URL.
        url: String,
        /// Underlying cause.
        reason: String,
    },
}

/// PDF rendering failed. No retry happens inside the renderer.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Temporary workspace for the render could not be created or written.
    #[error("Render workspace error: {0}")]
    Workspace(#[source] std::io::Error),

    /// The rendering engine could not be started.
    #[error("Renderer failed to start ({program}): {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// OS error.
        #[source]
        source: std::io::Error,
    },

    /// Collecting the engine's output failed.
    #[error("Waiting for renderer failed: {0}")]
    Wait(#[source] std::io::Error),

    /// The rendering engine did not finish in time and was killed.
    #[error("Renderer timed out after {0:?}")]
    Timeout(Duration),

    /// The rendering engine exited with a failure status.
    #[error("Renderer exited with status {status}: {stderr}")]
    Failed {
        /// Exit status description.
        status: String,
        /// Captured stderr, trimmed.
        stderr: String,
    },

    /// The engine produced no output.
    #[error("Renderer produced an empty document")]
    Empty,

    /// The output is not a PDF.
    #[error("Renderer produced a corrupt document: {0}")]
    Corrupt(String),
}

/// The report sink rejected a write.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Transport-level failure talking to the platform.
    #[error("Platform request failed: {0}")]
    Transport(String),

    /// The platform answered with GraphQL errors or an unexpected shape.
    #[error("Platform rejected {operation}: {message}")]
    Rejected {
        /// Operation name.
        operation: &'static str,
        /// Platform error message.
        message: String,
    },

    /// The report does not exist.
    #[error("Report not found: {0}")]
    NotFound(String),
}

/// Configuration could not be loaded or is invalid.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Read {
        /// Config file path.
        path: String,
        /// OS error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid YAML for the expected shape.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// An environment override could not be parsed.
    #[error("Invalid value for {key}: {value}")]
    Env {
        /// Environment variable name.
        key: String,
        /// Offending value.
        value: String,
    },

    /// One or more values failed validation.
    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Crate-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network fetch failure.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Content extraction failure.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// PDF rendering failure.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Report sink failure.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Scratch space could not be created or written. Stops the whole run,
    /// unlike the per-report failures above.
    #[error("Resource exhaustion: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error must stop the connector instead of failing one report.
    #[must_use]
    pub const fn is_resource_exhaustion(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_fetch_lists_every_attempt() {
        let err = FetchError::Exhausted {
            url: "https://example.com/a".to_string(),
            attempts: vec![
                FetchError::Attempt { method: "direct", reason: "HTTP 500".to_string() },
                FetchError::Attempt { method: "command-line", reason: "exit 4".to_string() },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("https://example.com/a"));
        assert!(msg.contains("direct fetch failed: HTTP 500"));
        assert!(msg.contains("command-line fetch failed: exit 4"));
    }

    #[test]
    fn config_invalid_joins_problems() {
        let err = ConfigError::Invalid(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "Invalid configuration: a; b");
    }

    #[test]
    fn stage_errors_convert_into_crate_error() {
        let err: Error = RenderError::Empty.into();
        assert!(matches!(err, Error::Render(RenderError::Empty)));
        assert!(!err.is_resource_exhaustion());
    }

    #[test]
    fn io_errors_are_resource_exhaustion() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::StorageFull, "no space left").into();
        assert!(err.is_resource_exhaustion());
        assert!(err.to_string().contains("no space left"));
    }
}
