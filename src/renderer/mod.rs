//! PDF rendering through a headless HTML-to-PDF engine (`wkhtmltopdf`).
//!
//! Each render gets its own [`Workspace`] holding the input document, the
//! output file and a private runtime directory. The workspace is removed on
//! every exit path, and the engine is killed if it outlives the timeout.

pub mod shell;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::RenderError;
use crate::options::Options;
use crate::process::{run_bounded, RunError, Workspace};

pub use shell::print_shell;

/// Leading bytes of every PDF file.
pub const PDF_MAGIC: &[u8] = b"%PDF";

/// Page layout of the rendered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutMode {
    /// Paginated rendering that keeps the page's own structure.
    Original,
    /// Single readable column.
    Simple,
}

impl LayoutMode {
    /// Layout for the `preserve_original_layout` setting.
    #[must_use]
    pub const fn from_preserve(preserve_original_layout: bool) -> Self {
        if preserve_original_layout {
            Self::Original
        } else {
            Self::Simple
        }
    }

    /// Name used in filenames and CSS classes.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Simple => "simple",
        }
    }
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders print shells to PDF bytes.
#[derive(Debug, Clone)]
pub struct Renderer {
    program: PathBuf,
    timeout: Duration,
    load_images: bool,
    scratch_root: Option<PathBuf>,
}

impl Renderer {
    /// Renderer configured from pipeline options.
    #[must_use]
    pub fn new(options: &Options) -> Self {
        Self {
            program: options.renderer_path.clone(),
            timeout: options.render_timeout,
            load_images: options.include_images,
            scratch_root: options.scratch_dir.clone(),
        }
    }

    /// Render `body_html` under `title` to PDF bytes. `cms_theme` selects
    /// extra typography for known CMS themes.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] on spawn failure, timeout, non-zero exit, empty
    /// output or output without a PDF header. Nothing is retried.
    /// [`RenderError::Workspace`] means scratch space is unavailable.
    pub async fn render(
        &self,
        body_html: &str,
        title: &str,
        source_url: Option<&str>,
        cms_theme: Option<&str>,
        layout: LayoutMode,
    ) -> Result<Vec<u8>, RenderError> {
        let workspace =
            Workspace::new_in(self.scratch_root.as_deref(), "report-render-").map_err(RenderError::Workspace)?;
        let input = workspace.file("article.html");
        let output = workspace.file("article.pdf");
        let runtime_dir = workspace.subdir("runtime").map_err(RenderError::Workspace)?;
        restrict_permissions(&runtime_dir).map_err(RenderError::Workspace)?;

        let document = print_shell(body_html, title, source_url, cms_theme, layout);
        tokio::fs::write(&input, document.as_bytes())
            .await
            .map_err(RenderError::Workspace)?;

        let command = self.command(&input, &output, &runtime_dir);
        debug!(program = %self.program.display(), %layout, bytes = document.len(), "starting render");

        let result = run_bounded(command, self.timeout).await.map_err(|e| match e {
            RunError::Spawn { program, source } => RenderError::Spawn { program, source },
            RunError::Timeout(after) => RenderError::Timeout(after),
            RunError::Io(err) => RenderError::Wait(err),
        })?;

        if !result.status.success() {
            return Err(RenderError::Failed {
                status: result.status.to_string(),
                stderr: result.stderr_excerpt(),
            });
        }

        let pdf = match tokio::fs::read(&output).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(RenderError::Empty),
            Err(e) => return Err(RenderError::Workspace(e)),
        };
        validate_pdf(&pdf)?;

        info!(bytes = pdf.len(), %layout, "PDF rendered");
        Ok(pdf)
    }

    fn command(&self, input: &Path, output: &Path, runtime_dir: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args([
                "--quiet",
                "--page-size",
                "A4",
                "--encoding",
                "UTF-8",
                "--enable-local-file-access",
                "--margin-top",
                "10mm",
                "--margin-right",
                "10mm",
                "--margin-bottom",
                "15mm",
                "--margin-left",
                "10mm",
                "--disable-javascript",
                "--load-error-handling",
                "ignore",
                "--load-media-error-handling",
                "ignore",
                "--no-stop-slow-scripts",
                "--disable-smart-shrinking",
            ])
            .arg(if self.load_images { "--images" } else { "--no-images" })
            .arg(input)
            .arg(output)
            .env("XDG_RUNTIME_DIR", runtime_dir)
            .env("QT_LOGGING_RULES", "*.debug=false;qt.qpa.*=false");
        command
    }
}

/// Check that `bytes` is a non-empty PDF.
///
/// # Errors
///
/// [`RenderError::Empty`] for no bytes, [`RenderError::Corrupt`] when the PDF
/// header is missing.
pub fn validate_pdf(bytes: &[u8]) -> Result<(), RenderError> {
    if bytes.is_empty() {
        return Err(RenderError::Empty);
    }
    if !bytes.starts_with(PDF_MAGIC) {
        let head: String = String::from_utf8_lossy(&bytes[..bytes.len().min(16)]).into_owned();
        return Err(RenderError::Corrupt(format!("missing PDF header, starts with {head:?}")));
    }
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn restrict_permissions(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_pdf_kinds() {
        assert!(validate_pdf(b"%PDF-1.7\n...").is_ok());
        assert!(matches!(validate_pdf(b""), Err(RenderError::Empty)));
        assert!(matches!(validate_pdf(b"<html>"), Err(RenderError::Corrupt(_))));
    }

    #[test]
    fn layout_from_preserve_flag() {
        assert_eq!(LayoutMode::from_preserve(true), LayoutMode::Original);
        assert_eq!(LayoutMode::from_preserve(false).as_str(), "simple");
    }

    #[cfg(unix)]
    mod engine {
        use std::os::unix::fs::PermissionsExt;

        use tempfile::TempDir;

        use super::super::*;

        fn fake_engine(dir: &TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("wkhtmltopdf");
            std::fs::write(&path, format!("#!/bin/sh\nfor a; do out=\"$a\"; done\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn renderer(program: PathBuf, timeout: Duration) -> Renderer {
            Renderer { program, timeout, load_images: true, scratch_root: None }
        }

        #[tokio::test]
        async fn successful_render_returns_pdf_bytes() {
            let dir = TempDir::new().unwrap();
            let engine = fake_engine(&dir, r#"test -n "$XDG_RUNTIME_DIR" || exit 9; printf '%%PDF-1.4 fake' > "$out""#);

            let pdf = renderer(engine, Duration::from_secs(10))
                .render("<p>body</p>", "Title", Some("https://e.com"), Some("astra"), LayoutMode::Original)
                .await
                .unwrap();

            assert!(pdf.starts_with(PDF_MAGIC));
        }

        #[tokio::test]
        async fn failure_kinds_are_distinguished() {
            let dir = TempDir::new().unwrap();

            let failing = fake_engine(&dir, "echo broken >&2; exit 3");
            let err = renderer(failing, Duration::from_secs(10))
                .render("<p>x</p>", "t", None, None, LayoutMode::Simple)
                .await
                .unwrap_err();
            assert!(matches!(err, RenderError::Failed { ref stderr, .. } if stderr == "broken"));

            let dir = TempDir::new().unwrap();
            let silent = fake_engine(&dir, "exit 0");
            let err = renderer(silent, Duration::from_secs(10))
                .render("<p>x</p>", "t", None, None, LayoutMode::Simple)
                .await
                .unwrap_err();
            assert!(matches!(err, RenderError::Empty));

            let dir = TempDir::new().unwrap();
            let corrupt = fake_engine(&dir, r#"echo garbage > "$out""#);
            let err = renderer(corrupt, Duration::from_secs(10))
                .render("<p>x</p>", "t", None, None, LayoutMode::Simple)
                .await
                .unwrap_err();
            assert!(matches!(err, RenderError::Corrupt(_)));
        }

        #[tokio::test]
        async fn slow_engine_times_out() {
            let dir = TempDir::new().unwrap();
            let slow = fake_engine(&dir, "sleep 10");

            let err = renderer(slow, Duration::from_millis(200))
                .render("<p>x</p>", "t", None, None, LayoutMode::Original)
                .await
                .unwrap_err();

            assert!(matches!(err, RenderError::Timeout(_)));
        }

        #[tokio::test]
        async fn unwritable_scratch_space_is_a_workspace_error() {
            let dir = TempDir::new().unwrap();
            let engine = fake_engine(&dir, r#"printf '%%PDF-1.4' > "$out""#);
            let mut renderer = renderer(engine, Duration::from_secs(10));
            renderer.scratch_root = Some(dir.path().join("missing").join("deeper"));

            let err = renderer
                .render("<p>x</p>", "t", None, None, LayoutMode::Simple)
                .await
                .unwrap_err();

            assert!(matches!(err, RenderError::Workspace(_)));
        }

        #[tokio::test]
        async fn missing_engine_is_a_spawn_failure() {
            let err = renderer(PathBuf::from("/nonexistent/wkhtmltopdf"), Duration::from_secs(1))
                .render("<p>x</p>", "t", None, None, LayoutMode::Original)
                .await
                .unwrap_err();

            assert!(matches!(err, RenderError::Spawn { .. }));
        }
    }
}
