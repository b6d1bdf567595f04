//! repo-sync - mirror a repository's main branch to a destination repository
//!
//! ## Commands
//!
//! - `run`: evaluate the trigger and, when it fires, check out, archive and sync
//! - `check`: evaluate the trigger only

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use repo_sync_core::credentials::{ENV_DEST_REPO, ENV_TOKEN, ENV_USERNAME};
use repo_sync_core::{
    ArchivePolicy, EventType, JobReport, RepoSyncJob, StepStatus, SyncConfig, SyncCredentials,
    TriggerEvent, TriggerGuard,
};
use std::path::PathBuf;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "repo-sync")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Mirror a repository's main branch on push or manual dispatch", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the trigger and run checkout, archive and sync when it fires
    Run(RunArgs),

    /// Evaluate the trigger only and print the decision
    Check {
        #[command(flatten)]
        trigger: TriggerArgs,

        /// Print the decision as JSON
        #[arg(long = "json-output")]
        json_output: bool,
    },
}

#[derive(Args, Debug, Clone)]
struct TriggerArgs {
    /// Event name (push, workflow_dispatch, manual, ...)
    #[arg(long, env = "GITHUB_EVENT_NAME")]
    event_name: Option<String>,

    /// Ref the event fired on (refs/heads/main or main)
    #[arg(long = "ref", env = "GITHUB_REF", default_value = "")]
    git_ref: String,

    /// Invoking repository (owner/name)
    #[arg(long, env = "GITHUB_REPOSITORY", default_value = "")]
    repository: String,

    /// Commit the event refers to
    #[arg(long, env = "GITHUB_SHA")]
    sha: Option<String>,

    /// The only repository allowed to run the sync (default: $REPO_SYNC_ALLOWED_REPOSITORY)
    #[arg(long)]
    allowed_repository: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    #[command(flatten)]
    trigger: TriggerArgs,

    /// Source repository URL or path
    /// (default: $REPO_SYNC_SOURCE or $GITHUB_SERVER_URL/$GITHUB_REPOSITORY)
    #[arg(long)]
    source: Option<String>,

    /// Checkout directory, must be empty (default: a temporary directory)
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// Directory receiving the archive artifact (default: $REPO_SYNC_ARTIFACTS_DIR or ./artifacts)
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,

    /// What an archive failure means: best-effort or fail-fast
    #[arg(long, default_value = "best-effort", value_parser = parse_archive_policy)]
    archive_policy: ArchivePolicy,

    /// Host for owner/name destinations
    #[arg(long, default_value = "github.com")]
    git_host: String,

    /// Timeout for each git invocation in seconds (0 disables it)
    #[arg(long, default_value = "600")]
    step_timeout_secs: u64,

    /// Bot account pushing to the destination
    #[arg(long, env = ENV_USERNAME, hide_env_values = true, default_value = "")]
    username: String,

    /// Destination repository (owner/name, URL or path)
    #[arg(long, env = ENV_DEST_REPO, hide_env_values = true, default_value = "")]
    destination: String,

    /// Write the job report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

fn parse_archive_policy(s: &str) -> std::result::Result<ArchivePolicy, String> {
    s.parse::<ArchivePolicy>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    repo_sync_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Check {
            trigger,
            json_output,
        } => cmd_check(&trigger, json_output),
    }
}

impl TriggerArgs {
    fn event(&self) -> Result<TriggerEvent> {
        let event_name = self
            .event_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .context("No trigger event: pass --event-name or set GITHUB_EVENT_NAME")?;

        let event = TriggerEvent::new(EventType::parse(event_name), &self.git_ref, &self.repository);
        Ok(match &self.sha {
            Some(sha) => event.with_sha(sha.as_str()),
            None => event,
        })
    }

    fn apply(&self, guard: &mut TriggerGuard) {
        if let Some(allowed) = &self.allowed_repository {
            guard.allowed_repository = allowed.clone();
        }
    }
}

/// Evaluate the trigger guard without running anything
fn cmd_check(trigger: &TriggerArgs, json_output: bool) -> Result<()> {
    let mut config = SyncConfig::from_env();
    trigger.apply(&mut config.guard);
    let event = trigger.event()?;
    let decision = config.guard.evaluate(&event);

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "trigger": event,
                "decision": decision,
            }))?
        );
        return Ok(());
    }

    println!("Event: {} on '{}' in '{}'", event.event_type, event.branch, event.repository);
    match decision {
        repo_sync_core::GuardDecision::Run => println!("Decision: run"),
        repo_sync_core::GuardDecision::Skip(reason) => println!("Decision: skip ({reason})"),
    }
    Ok(())
}

fn build_config(args: &RunArgs) -> SyncConfig {
    let mut config = SyncConfig::from_env()
        .with_archive_policy(args.archive_policy)
        .with_git_host(args.git_host.clone())
        .with_step_timeout_secs(args.step_timeout_secs);
    args.trigger.apply(&mut config.guard);
    if let Some(source) = &args.source {
        config.source = source.clone();
    }
    if let Some(workdir) = &args.workdir {
        config = config.with_workdir(workdir.clone());
    }
    if let Some(dir) = &args.artifacts_dir {
        config = config.with_artifacts_dir(dir.clone());
    }
    config
}

/// Run the sync job for the current trigger
async fn cmd_run(args: RunArgs) -> Result<()> {
    let event = args.trigger.event()?;
    let config = build_config(&args);
    let credentials = SyncCredentials::new(
        args.username.clone(),
        std::env::var(ENV_TOKEN).unwrap_or_default(),
        args.destination.clone(),
    );

    info!(
        event = %event.event_type,
        branch = %event.branch,
        repository = %event.repository,
        "Evaluating sync trigger"
    );

    let report = RepoSyncJob::new(config)
        .run(event, &credentials)
        .await
        .context("Sync job could not start")?;

    if let Some(path) = &args.report {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    print_report(&report);

    if report.success {
        Ok(())
    } else {
        anyhow::bail!("Sync job failed")
    }
}

fn print_report(report: &JobReport) {
    println!("Run ID: {}", report.run_id);
    if let repo_sync_core::GuardDecision::Skip(reason) = &report.decision {
        println!("Status: SKIPPED ({reason})");
        return;
    }

    println!("Status: {}", if report.success { "✓ PASSED" } else { "✗ FAILED" });
    println!("Duration: {}ms", report.duration_ms());
    if let Some(destination) = &report.destination {
        println!("Destination: {destination}");
    }
    println!();

    for step in &report.steps {
        let status = match step.status {
            StepStatus::Passed => "✓",
            StepStatus::Failed => "✗",
            StepStatus::Skipped => "-",
        };
        println!(
            "  {} {} ({}ms) {}",
            status,
            step.step.name(),
            step.duration_ms,
            step.detail
        );
    }

    for warning in &report.warnings {
        println!("Warning: {warning}");
    }
    if let Some(failure) = &report.failure {
        println!("\nFailure ({:?}): {}", failure.kind, failure.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments should parse")
    }

    #[test]
    fn run_args_parse() {
        let cli = parse(&[
            "repo-sync",
            "run",
            "--event-name",
            "push",
            "--ref",
            "refs/heads/main",
            "--repository",
            "acme/widgets",
            "--allowed-repository",
            "acme/widgets",
            "--source",
            "/srv/widgets",
            "--archive-policy",
            "fail-fast",
            "--step-timeout-secs",
            "30",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };

        let event = args.trigger.event().unwrap();
        assert_eq!(event.event_type, EventType::Push);
        assert_eq!(event.branch, "main");

        let config = build_config(&args);
        assert_eq!(config.source, "/srv/widgets");
        assert_eq!(config.guard.allowed_repository, "acme/widgets");
        assert_eq!(config.archive_policy, ArchivePolicy::FailFast);
        assert_eq!(config.step_timeout_secs, 30);
        assert!(config.guard.evaluate(&event).should_run());
    }

    #[test]
    fn invalid_archive_policy_is_rejected() {
        let result = Cli::try_parse_from([
            "repo-sync",
            "run",
            "--event-name",
            "push",
            "--archive-policy",
            "sometimes",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn workflow_dispatch_is_manual() {
        let cli = parse(&[
            "repo-sync",
            "check",
            "--event-name",
            "workflow_dispatch",
            "--ref",
            "refs/heads/release",
            "--repository",
            "acme/widgets",
            "--allowed-repository",
            "acme/widgets",
        ]);
        let Commands::Check { trigger, .. } = cli.command else {
            panic!("expected check command");
        };
        let event = trigger.event().unwrap();
        assert_eq!(event.event_type, EventType::Manual);
        assert_eq!(event.branch, "release");
    }

    #[test]
    fn empty_event_name_is_an_error() {
        let args = TriggerArgs {
            event_name: Some("  ".to_string()),
            git_ref: "main".to_string(),
            repository: "acme/widgets".to_string(),
            sha: None,
            allowed_repository: None,
        };
        assert!(args.event().is_err());
    }

    #[test]
    fn allowed_repository_override_applies_to_guard() {
        let args = TriggerArgs {
            event_name: Some("push".to_string()),
            git_ref: "refs/heads/main".to_string(),
            repository: "acme/widgets".to_string(),
            sha: Some("abc123".to_string()),
            allowed_repository: Some("acme/widgets".to_string()),
        };
        let mut guard = TriggerGuard::new("");
        args.apply(&mut guard);
        let event = args.event().unwrap();
        assert_eq!(event.sha.as_deref(), Some("abc123"));
        assert!(guard.evaluate(&event).should_run());
    }

    #[test]
    fn sync_branch_is_not_configurable() {
        let result = Cli::try_parse_from([
            "repo-sync",
            "check",
            "--event-name",
            "push",
            "--sync-branch",
            "trunk",
        ]);
        assert!(result.is_err());
    }
}
