//! Log setup for the `repo-sync` binary and the structured events a job
//! emits (`job.started`, `step.finished`, `job.skipped`, `job.finished`).

use crate::report::{StepKind, StepStatus};
use tracing::{info, warn, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the process-wide subscriber; `RUST_LOG` overrides `level`.
/// Later calls keep the first subscriber.
pub fn init_tracing(json: bool, level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);
    let layer = fmt::layer().with_target(false);
    let installed = if json {
        registry.with(layer.json()).try_init()
    } else {
        registry.with(layer).try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Run-scoped span; attach with `Instrument::instrument` so every event of
/// a job carries its `run_id`.
pub fn job_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("repo_sync.job", run_id = %run_id)
}

pub fn emit_job_started(run_id: &str, event: &str, branch: &str, repository: &str) {
    info!(
        event = "job.started",
        run_id = %run_id,
        trigger = %event,
        branch = %branch,
        repository = %repository,
    );
}

pub fn emit_job_skipped(run_id: &str, reason: &dyn std::fmt::Display) {
    info!(event = "job.skipped", run_id = %run_id, reason = %reason);
}

pub fn emit_step_finished(step: StepKind, status: StepStatus, duration_ms: u64, detail: &str) {
    match status {
        StepStatus::Failed => warn!(
            event = "step.finished",
            step = step.name(),
            status = ?status,
            duration_ms = duration_ms,
            detail = %detail,
        ),
        _ => info!(
            event = "step.finished",
            step = step.name(),
            status = ?status,
            duration_ms = duration_ms,
            detail = %detail,
        ),
    }
}

pub fn emit_job_finished(run_id: &str, duration_ms: u64, success: bool) {
    info!(
        event = "job.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        success = success,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_twice_does_not_panic() {
        init_tracing(false, Level::INFO);
        init_tracing(true, Level::DEBUG);
    }

    #[test]
    fn job_span_enter() {
        let _entered = job_span("test-run-id").entered();
        emit_step_finished(StepKind::Checkout, StepStatus::Passed, 1, "ok");
    }
}
