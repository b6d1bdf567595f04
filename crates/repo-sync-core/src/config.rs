//! Job configuration.

use crate::credentials::DEFAULT_GIT_HOST;
use crate::error::{Result, SyncError};
use crate::guard::TriggerGuard;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Artifact name of the archived checkout.
pub const DEFAULT_ARCHIVE_NAME: &str = "repo-archive";

/// Per-step timeout.
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 600;

pub const ENV_SOURCE: &str = "REPO_SYNC_SOURCE";
pub const ENV_ALLOWED_REPOSITORY: &str = "REPO_SYNC_ALLOWED_REPOSITORY";
pub const ENV_ARTIFACTS_DIR: &str = "REPO_SYNC_ARTIFACTS_DIR";

/// What a failed archive step means for the rest of the job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchivePolicy {
    /// Record the failure and continue with the sync.
    #[default]
    BestEffort,

    /// Stop the job; the sync does not run.
    FailFast,
}

impl FromStr for ArchivePolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "best-effort" => Ok(ArchivePolicy::BestEffort),
            "fail-fast" => Ok(ArchivePolicy::FailFast),
            other => Err(SyncError::Config(format!(
                "unknown archive policy '{other}' (expected best-effort or fail-fast)"
            ))),
        }
    }
}

impl fmt::Display for ArchivePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArchivePolicy::BestEffort => "best-effort",
            ArchivePolicy::FailFast => "fail-fast",
        })
    }
}

/// Configuration of a sync job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Repository to check out: a URL or local path.
    pub source: String,

    /// Trigger rules.
    pub guard: TriggerGuard,

    /// Checkout directory; a temporary directory when unset.
    pub workdir: Option<PathBuf>,

    /// Directory receiving the archive artifact.
    pub artifacts_dir: PathBuf,

    pub archive_name: String,

    pub archive_policy: ArchivePolicy,

    /// Host for `owner/name` destinations.
    pub git_host: String,

    /// Timeout for each git invocation, 0 disables it.
    pub step_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            source: std::env::var(ENV_SOURCE)
                .ok()
                .or_else(github_source)
                .unwrap_or_default(),
            guard: TriggerGuard::new(std::env::var(ENV_ALLOWED_REPOSITORY).unwrap_or_default()),
            workdir: None,
            artifacts_dir: std::env::var(ENV_ARTIFACTS_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("artifacts")),
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
            archive_policy: ArchivePolicy::default(),
            git_host: DEFAULT_GIT_HOST.to_string(),
            step_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
        }
    }
}

/// `$GITHUB_SERVER_URL/$GITHUB_REPOSITORY` when both are set.
fn github_source() -> Option<String> {
    let server = std::env::var("GITHUB_SERVER_URL").ok()?;
    let repository = std::env::var("GITHUB_REPOSITORY").ok()?;
    Some(format!("{}/{}", server.trim_end_matches('/'), repository))
}

impl SyncConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Config for a specific source and allowed repository.
    pub fn new(source: impl Into<String>, allowed_repository: impl Into<String>) -> Self {
        SyncConfig {
            source: source.into(),
            guard: TriggerGuard::new(allowed_repository),
            workdir: None,
            artifacts_dir: PathBuf::from("artifacts"),
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
            archive_policy: ArchivePolicy::default(),
            git_host: DEFAULT_GIT_HOST.to_string(),
            step_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
        }
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }

    pub fn with_archive_policy(mut self, policy: ArchivePolicy) -> Self {
        self.archive_policy = policy;
        self
    }

    pub fn with_git_host(mut self, host: impl Into<String>) -> Self {
        self.git_host = host.into();
        self
    }

    pub fn with_step_timeout_secs(mut self, secs: u64) -> Self {
        self.step_timeout_secs = secs;
        self
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    /// Check required fields before a run.
    pub fn validate(&self) -> Result<()> {
        if self.source.trim().is_empty() {
            return Err(SyncError::Config(format!(
                "no source repository ({ENV_SOURCE} or GITHUB_SERVER_URL/GITHUB_REPOSITORY)"
            )));
        }
        if self.guard.allowed_repository.trim().is_empty() {
            return Err(SyncError::Config(format!(
                "no allowed repository ({ENV_ALLOWED_REPOSITORY})"
            )));
        }
        if self.archive_name.trim().is_empty() {
            return Err(SyncError::Config("archive name is empty".to_string()));
        }
        Ok(())
    }
}
