//! Sync job orchestration: guard, then checkout → archive → sync.

use crate::artifact::{ArtifactStore, DirArtifactStore};
use crate::config::{ArchivePolicy, SyncConfig};
use crate::credentials::SyncCredentials;
use crate::error::{Result, SyncError};
use crate::git::GitRunner;
use crate::guard::GuardDecision;
use crate::report::{JobReport, StepKind, StepResult};
use crate::steps::{archive_checkout, checkout, sync_main};
use crate::telemetry::{
    emit_job_finished, emit_job_skipped, emit_job_started, emit_step_finished, job_span,
};
use crate::trigger::TriggerEvent;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn, Instrument};

/// Mirrors the source repository's `main` to the destination when the
/// trigger guard allows it.
#[derive(Clone)]
pub struct RepoSyncJob {
    config: SyncConfig,
    store: Arc<dyn ArtifactStore>,
}

impl std::fmt::Debug for RepoSyncJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoSyncJob")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RepoSyncJob {
    /// Job storing artifacts under `config.artifacts_dir`.
    pub fn new(config: SyncConfig) -> Self {
        let store = Arc::new(DirArtifactStore::new(config.artifacts_dir.clone()));
        Self { config, store }
    }

    /// Replace the artifact store.
    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn evaluate(&self, event: &TriggerEvent) -> GuardDecision {
        self.config.guard.evaluate(event)
    }

    /// Run the job for one trigger event.
    ///
    /// Step failures do not return `Err`; they are recorded in the report
    /// with `success = false`. `Err` is reserved for an invalid config.
    ///
    /// - guard skip: no steps, success
    /// - credentials rejected: all steps skipped, `AuthFailure`
    /// - checkout failure: archive and sync skipped
    /// - archive failure: sync still runs under `BestEffort`, skipped
    ///   under `FailFast`
    pub async fn run(
        &self,
        event: TriggerEvent,
        credentials: &SyncCredentials,
    ) -> Result<JobReport> {
        self.config.validate()?;

        let decision = self.evaluate(&event);
        let report = JobReport::new(event, decision);
        let span = job_span(&report.run_id.to_string());
        Ok(self.execute(report, credentials).instrument(span).await)
    }

    async fn execute(&self, mut report: JobReport, credentials: &SyncCredentials) -> JobReport {
        let run_id = report.run_id.to_string();
        emit_job_started(
            &run_id,
            report.trigger.event_type.name(),
            &report.trigger.branch,
            &report.trigger.repository,
        );

        if let GuardDecision::Skip(reason) = &report.decision {
            emit_job_skipped(&run_id, reason);
            return finish(report);
        }

        let remote = match credentials.remote(&self.config.git_host) {
            Ok(remote) => remote,
            Err(e) => {
                warn!(error = %e, "Destination credentials rejected");
                report.fail(&e);
                skip_remaining(&mut report, &StepKind::ORDER, "credentials rejected");
                return finish(report);
            }
        };
        report.destination = Some(remote.display().to_string());

        let git = GitRunner::new(self.config.step_timeout()).with_secrets(remote.secrets());

        // Keeps the temporary checkout alive until the job returns.
        let mut temp_guard = None;
        let work_dir = match &self.config.workdir {
            Some(dir) => dir.clone(),
            None => match tempfile::Builder::new().prefix("repo-sync-").tempdir() {
                Ok(dir) => temp_guard.insert(dir).path().join("checkout"),
                Err(e) => {
                    let err = SyncError::Checkout(format!("cannot create work directory: {e}"));
                    record(&mut report, StepResult::failed(StepKind::Checkout, 0, &err));
                    report.fail(&err);
                    skip_remaining(&mut report, &StepKind::ORDER[1..], "checkout failed");
                    return finish(report);
                }
            },
        };

        // Checkout
        let started = Instant::now();
        let result = checkout(&git, &self.config.source, &work_dir, &report.trigger).await;
        let checked_out = match result {
            Ok(outcome) => {
                record(
                    &mut report,
                    StepResult::passed(StepKind::Checkout, elapsed_ms(started), &outcome.head_sha),
                );
                report.source_sha = Some(outcome.source_sha.clone());
                outcome
            }
            Err(e) => {
                record(
                    &mut report,
                    StepResult::failed(StepKind::Checkout, elapsed_ms(started), &e),
                );
                report.fail(&e);
                skip_remaining(&mut report, &StepKind::ORDER[1..], "checkout failed");
                return finish(report);
            }
        };

        // Archive
        let started = Instant::now();
        let result = archive_checkout(
            &git,
            &checked_out.repo_dir,
            &checked_out.head_sha,
            self.store.as_ref(),
            &self.config.archive_name,
        )
        .await;
        match result {
            Ok(manifest) => {
                record(
                    &mut report,
                    StepResult::passed(StepKind::Archive, elapsed_ms(started), &manifest.location),
                );
                report.archive = Some(manifest);
            }
            Err(e) => {
                record(
                    &mut report,
                    StepResult::failed(StepKind::Archive, elapsed_ms(started), &e),
                );
                match self.config.archive_policy {
                    ArchivePolicy::BestEffort => {
                        warn!(error = %e, "Archive failed, continuing with sync");
                        report.warnings.push(e.to_string());
                    }
                    ArchivePolicy::FailFast => {
                        report.fail(&e);
                        skip_remaining(&mut report, &[StepKind::Sync], "archive failed");
                        return finish(report);
                    }
                }
            }
        }

        // Sync
        let started = Instant::now();
        let result = sync_main(
            &git,
            &checked_out.repo_dir,
            &remote,
            &checked_out.source_sha,
        )
        .await;
        match result {
            Ok(sha) => {
                record(
                    &mut report,
                    StepResult::passed(StepKind::Sync, elapsed_ms(started), &sha),
                );
                report.destination_sha = Some(sha);
            }
            Err(e) => {
                record(
                    &mut report,
                    StepResult::failed(StepKind::Sync, elapsed_ms(started), &e),
                );
                report.fail(&e);
            }
        }

        finish(report)
    }
}

fn record(report: &mut JobReport, result: StepResult) {
    emit_step_finished(result.step, result.status, result.duration_ms, &result.detail);
    report.steps.push(result);
}

fn skip_remaining(report: &mut JobReport, steps: &[StepKind], reason: &str) {
    for step in steps {
        record(report, StepResult::skipped(*step, reason));
    }
}

fn finish(mut report: JobReport) -> JobReport {
    report.finished_at = Utc::now();
    emit_job_finished(
        &report.run_id.to_string(),
        report.duration_ms(),
        report.success,
    );
    if report.success && !report.skipped() {
        info!(run_id = %report.run_id, "Sync job completed successfully");
    }
    report
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
