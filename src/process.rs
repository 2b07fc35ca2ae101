//! Scoped guards for external tools.
//!
//! The command-line fetcher, the headless browser and the PDF engine all run
//! as child processes with scratch files. [`Workspace`] owns the scratch
//! directory and [`ProcessGuard`] owns the child; both release their resource
//! in `Drop`, so every exit path (success, error, timeout, cancelled future)
//! cleans up.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Scratch directory removed when dropped.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh directory under the system temp dir.
    pub fn new(prefix: &str) -> io::Result<Self> {
        Self::new_in(None, prefix)
    }

    /// Create a fresh directory under `root`, or the system temp dir for `None`.
    pub fn new_in(root: Option<&Path>, prefix: &str) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        debug!(path = %dir.path().display(), "created workspace");
        Ok(Self { dir })
    }

    /// Directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file inside the workspace.
    #[must_use]
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Create a subdirectory, e.g. a browser profile or a runtime dir.
    pub fn subdir(&self, name: &str) -> io::Result<PathBuf> {
        let path = self.file(name);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }
}

/// Captured output of a finished child.
#[derive(Debug)]
pub struct ProcessOutput {
    /// Exit status.
    pub status: ExitStatus,
    /// Everything written to stdout.
    pub stdout: Vec<u8>,
    /// Everything written to stderr.
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    /// Stderr as lossy UTF-8, trimmed and capped for log lines.
    #[must_use]
    pub fn stderr_excerpt(&self) -> String {
        let text = String::from_utf8_lossy(&self.stderr);
        text.trim().chars().take(500).collect()
    }
}

/// Why a bounded run did not produce output.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The program could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program name.
        program: String,
        /// OS error.
        #[source]
        source: io::Error,
    },

    /// The program did not exit within the deadline and was killed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Reading the program's output failed.
    #[error("I/O error while waiting: {0}")]
    Io(#[from] io::Error),
}

/// Owns a running child. Dropping the guard before the child is reaped kills
/// it together with its process group.
#[derive(Debug)]
pub struct ProcessGuard {
    child: Child,
    program: String,
    reaped: bool,
}

impl ProcessGuard {
    /// Spawn `command` with null stdin and piped stdout/stderr, in its own
    /// process group on unix.
    pub fn spawn(mut command: Command) -> Result<Self, RunError> {
        let program = command.as_std().get_program().to_string_lossy().into_owned();
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|source| RunError::Spawn {
            program: program.clone(),
            source,
        })?;
        debug!(program = %program, pid = ?child.id(), "spawned child process");

        Ok(Self { child, program, reaped: false })
    }

    /// Wait for exit, collecting output, for at most `timeout`.
    pub async fn wait(mut self, timeout: Duration) -> Result<ProcessOutput, RunError> {
        let stdout = self.child.stdout.take();
        let stderr = self.child.stderr.take();
        let child = &mut self.child;

        let collect = async move {
            let (status, stdout, stderr) =
                tokio::try_join!(child.wait(), read_all(stdout), read_all(stderr))?;
            Ok::<_, io::Error>(ProcessOutput { status, stdout, stderr })
        };

        match tokio::time::timeout(timeout, collect).await {
            Ok(Ok(output)) => {
                self.reaped = true;
                Ok(output)
            }
            Ok(Err(err)) => Err(RunError::Io(err)),
            Err(_) => {
                debug!(program = %self.program, ?timeout, "child process timed out");
                Err(RunError::Timeout(timeout))
            }
        }
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            kill_process_group(pid, &self.program);
        }
        if let Err(err) = self.child.start_kill() {
            debug!(program = %self.program, error = %err, "child already exited");
        }
    }
}

/// SIGKILL the group led by `pid`, so helpers forked by the tool die too.
/// Spawned without waiting when a runtime is available; tokio reaps it.
#[cfg(unix)]
fn kill_process_group(pid: u32, program: &str) {
    let group = format!("-{pid}");
    let args = ["-KILL", "--", group.as_str()];
    let spawned = if tokio::runtime::Handle::try_current().is_ok() {
        Command::new("kill")
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(drop)
    } else {
        std::process::Command::new("kill")
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(drop)
    };
    if let Err(err) = spawned {
        warn!(program, pid, error = %err, "failed to signal process group");
    }
}

async fn read_all<R>(stream: Option<R>) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Spawn `command` and wait for it with a deadline. The child is killed on
/// timeout and on cancellation of the returned future.
pub async fn run_bounded(command: Command, timeout: Duration) -> Result<ProcessOutput, RunError> {
    ProcessGuard::spawn(command)?.wait(timeout).await
}
