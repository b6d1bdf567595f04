//! Job and step results.

use crate::error::{FailureKind, SyncError};
use crate::guard::GuardDecision;
use crate::trigger::TriggerEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// The three job steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Checkout,
    Archive,
    Sync,
}

impl StepKind {
    pub const ORDER: [StepKind; 3] = [StepKind::Checkout, StepKind::Archive, StepKind::Sync];

    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Checkout => "checkout",
            StepKind::Archive => "archive",
            StepKind::Sync => "sync",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    /// Not executed because an earlier step failed.
    Skipped,
}

/// Result of a single step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: StepKind,

    pub status: StepStatus,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Short human-readable outcome (sha, artifact location, error).
    pub detail: String,
}

impl StepResult {
    pub fn passed(step: StepKind, duration_ms: u64, detail: impl Into<String>) -> Self {
        Self {
            step,
            status: StepStatus::Passed,
            duration_ms,
            detail: detail.into(),
        }
    }

    pub fn failed(step: StepKind, duration_ms: u64, error: &SyncError) -> Self {
        Self {
            step,
            status: StepStatus::Failed,
            duration_ms,
            detail: error.to_string(),
        }
    }

    pub fn skipped(step: StepKind, reason: impl Into<String>) -> Self {
        Self {
            step,
            status: StepStatus::Skipped,
            duration_ms: 0,
            detail: reason.into(),
        }
    }

    pub fn is_passed(&self) -> bool {
        self.status == StepStatus::Passed
    }
}

/// Manifest stored next to the archive artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub artifact_name: String,
    pub file_name: String,
    pub location: String,
    pub size_bytes: u64,
    /// SHA-256 hex digest of the archive.
    pub digest: String,
    /// Commit whose tree was archived.
    pub commit_sha: String,
    pub created_at: DateTime<Utc>,
}

/// First failure of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&SyncError> for JobFailure {
    fn from(err: &SyncError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result of one job invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub run_id: Uuid,

    pub trigger: TriggerEvent,

    pub decision: GuardDecision,

    /// Empty when the guard skipped the run.
    pub steps: Vec<StepResult>,

    /// Source `main` at checkout time.
    pub source_sha: Option<String>,

    /// Destination `main` after the sync.
    pub destination_sha: Option<String>,

    /// Destination URL without credentials.
    pub destination: Option<String>,

    pub archive: Option<ArchiveManifest>,

    /// Whether the job should be reported as successful.
    pub success: bool,

    /// The failure that decided `success = false`.
    pub failure: Option<JobFailure>,

    /// Failures that did not fail the job (best-effort archive).
    pub warnings: Vec<String>,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    pub(crate) fn new(trigger: TriggerEvent, decision: GuardDecision) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            trigger,
            decision,
            steps: Vec::new(),
            source_sha: None,
            destination_sha: None,
            destination: None,
            archive: None,
            success: true,
            failure: None,
            warnings: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    pub fn skipped(&self) -> bool {
        !self.decision.should_run()
    }

    /// Whether the sync step ran and passed.
    pub fn synced(&self) -> bool {
        self.step(StepKind::Sync).is_some_and(StepResult::is_passed)
    }

    pub fn step(&self, kind: StepKind) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step == kind)
    }

    /// Number of steps that passed.
    pub fn passed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.is_passed()).count()
    }

    /// Number of steps that failed.
    pub fn failed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
            .count()
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }

    pub(crate) fn fail(&mut self, err: &SyncError) {
        self.success = false;
        if self.failure.is_none() {
            self.failure = Some(JobFailure::from(err));
        }
    }

    /// Write the report as pretty JSON, creating parent directories.
    pub fn write_json(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::SkipReason;

    fn report() -> JobReport {
        JobReport::new(
            TriggerEvent::push("refs/heads/main", "acme/widgets"),
            GuardDecision::Run,
        )
    }

    #[test]
    fn counts_steps_by_status() {
        let mut report = report();
        report.steps = vec![
            StepResult::passed(StepKind::Checkout, 100, "abc"),
            StepResult::failed(StepKind::Archive, 5, &SyncError::Archive("disk".into())),
            StepResult::passed(StepKind::Sync, 200, "abc"),
        ];
        assert_eq!(report.passed_count(), 2);
        assert_eq!(report.failed_count(), 1);
        assert!(report.synced());
    }

    #[test]
    fn skipped_sync_is_not_synced() {
        let mut report = report();
        report.steps = vec![
            StepResult::failed(StepKind::Checkout, 1, &SyncError::Checkout("gone".into())),
            StepResult::skipped(StepKind::Archive, "checkout failed"),
            StepResult::skipped(StepKind::Sync, "checkout failed"),
        ];
        assert!(!report.synced());
        assert_eq!(report.failed_count(), 1);
    }

    #[test]
    fn first_failure_wins() {
        let mut report = report();
        report.fail(&SyncError::Archive("first".into()));
        report.fail(&SyncError::Push("second".into()));
        assert!(!report.success);
        assert_eq!(
            report.failure.as_ref().map(|f| f.kind),
            Some(FailureKind::ArchiveFailure)
        );
    }

    #[test]
    fn skipped_report_reflects_decision() {
        let report = JobReport::new(
            TriggerEvent::push("refs/heads/dev", "acme/widgets"),
            GuardDecision::Skip(SkipReason::BranchMismatch {
                expected: "main".into(),
                actual: "dev".into(),
            }),
        );
        assert!(report.skipped());
        assert!(report.success);
        assert!(report.steps.is_empty());
    }

    #[test]
    fn write_json_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("run.json");
        report().write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["decision"]["decision"], "run");
        assert_eq!(value["trigger"]["branch"], "main");
    }
}
