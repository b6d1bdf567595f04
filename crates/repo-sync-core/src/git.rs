//! Async `git` subprocess execution.

use crate::credentials::redact;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

/// Captured result of a git invocation.
#[derive(Debug, Clone)]
pub struct GitOutput {
    /// Exit code (-1 when killed by a signal).
    pub exit_code: i32,

    /// Raw stdout.
    pub stdout: Vec<u8>,

    /// Captured stderr, secrets already redacted.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }
}

/// Why a git invocation produced no [`GitOutput`].
#[derive(Debug)]
pub enum GitInvokeError {
    Spawn(std::io::Error),
    TimedOut(Duration),
}

impl std::fmt::Display for GitInvokeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitInvokeError::Spawn(e) => write!(f, "failed to run git: {e}"),
            GitInvokeError::TimedOut(t) => write!(f, "git timed out after {} seconds", t.as_secs()),
        }
    }
}

/// Runs `git` with a timeout, never prompting for credentials.
#[derive(Debug, Clone)]
pub struct GitRunner {
    timeout: Duration,
    secrets: Vec<String>,
}

impl GitRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            secrets: Vec::new(),
        }
    }

    /// Strings that must never appear in captured output.
    pub fn with_secrets(mut self, secrets: &[String]) -> Self {
        self.secrets.extend(secrets.iter().cloned());
        self
    }

    pub fn redact(&self, text: &str) -> String {
        redact(text, &self.secrets)
    }

    /// Execute `git <args>` in `cwd`.
    ///
    /// A zero timeout disables the limit.
    pub async fn run(
        &self,
        args: &[&str],
        cwd: &Path,
    ) -> std::result::Result<GitOutput, GitInvokeError> {
        let start = Instant::now();
        debug!(args = %self.redact(&args.join(" ")), cwd = %cwd.display(), "Running git");

        let child = Command::new("git")
            .args(args)
            .current_dir(cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(GitInvokeError::Spawn)?;

        let waited = if self.timeout.is_zero() {
            child.wait_with_output().await
        } else {
            tokio::time::timeout(self.timeout, child.wait_with_output())
                .await
                .map_err(|_| GitInvokeError::TimedOut(self.timeout))?
        };
        let output = waited.map_err(GitInvokeError::Spawn)?;

        Ok(GitOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: self.redact(String::from_utf8_lossy(&output.stderr).trim()),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Resolve a revision to a full sha, `None` if it does not exist.
    pub async fn rev_parse(
        &self,
        repo_dir: &Path,
        rev: &str,
    ) -> std::result::Result<Option<String>, GitInvokeError> {
        let spec = format!("{rev}^{{commit}}");
        let output = self
            .run(&["rev-parse", "--verify", "--quiet", &spec], repo_dir)
            .await?;
        let sha = output.stdout_text();
        Ok((output.success() && !sha.is_empty()).then_some(sha))
    }

    /// List `refs/heads/<branch>` on `remote`.
    pub async fn ls_remote_head(
        &self,
        repo_dir: &Path,
        remote: &str,
        branch: &str,
    ) -> std::result::Result<GitOutput, GitInvokeError> {
        let head = format!("refs/heads/{branch}");
        self.run(&["ls-remote", remote, &head], repo_dir).await
    }
}

/// Sha advertised for `refs/heads/<branch>` in `ls-remote` output.
pub fn parse_ls_remote_head(stdout: &str, branch: &str) -> Option<String> {
    let head = format!("refs/heads/{branch}");
    stdout.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some(sha), Some(name)) if name == head => Some(sha.to_string()),
            _ => None,
        }
    })
}
