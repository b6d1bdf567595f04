//! Checkout: clone the full history of the source repository.

use crate::error::{Result, SyncError};
use crate::git::GitRunner;
use crate::guard::SYNC_BRANCH;
use crate::trigger::TriggerEvent;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where the checkout landed and what it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutOutcome {
    pub repo_dir: PathBuf,

    /// Commit checked out in the work tree.
    pub head_sha: String,

    /// Source `refs/heads/main` at clone time.
    pub source_sha: String,
}

/// Clone `source` into `work_dir` and check out the triggering revision.
///
/// `work_dir` must be absent or empty. The revision checked out is, in
/// order of preference: the event sha, the event ref, the clone default.
/// Fails when the source is unreachable or lacks `main`.
pub async fn checkout(
    git: &GitRunner,
    source: &str,
    work_dir: &Path,
    event: &TriggerEvent,
) -> Result<CheckoutOutcome> {
    prepare_work_dir(work_dir)?;
    let work_dir = &absolute(work_dir)?;
    // Relative local sources are resolved against our cwd, not the clone's.
    let source = match Path::new(source) {
        path if path.exists() => absolute(path)?.to_string_lossy().to_string(),
        _ => source.to_string(),
    };

    info!(work_dir = %work_dir.display(), "Cloning source repository");
    let clone = git
        .run(&["clone", "--quiet", "--", &source, "."], work_dir)
        .await
        .map_err(|e| SyncError::Checkout(e.to_string()))?;
    if !clone.success() {
        return Err(SyncError::Checkout(format!(
            "git clone exited with code {}: {}",
            clone.exit_code, clone.stderr
        )));
    }

    let remote_branch = format!("refs/remotes/origin/{SYNC_BRANCH}");
    let source_sha = rev_parse(git, work_dir, &remote_branch)
        .await?
        .ok_or_else(|| {
            SyncError::Checkout(format!("source repository has no branch '{SYNC_BRANCH}'"))
        })?;

    let target = match &event.sha {
        Some(sha) => Some(sha.clone()),
        None => checkout_target(&event.branch),
    };
    if let Some(target) = target {
        debug!(target = %target, "Checking out triggering revision");
        let output = git
            .run(&["checkout", "--quiet", "--detach", &target], work_dir)
            .await
            .map_err(|e| SyncError::Checkout(e.to_string()))?;
        if !output.success() {
            return Err(SyncError::Checkout(format!(
                "cannot check out '{target}': {}",
                output.stderr
            )));
        }
    }

    let head_sha = rev_parse(git, work_dir, "HEAD")
        .await?
        .ok_or_else(|| SyncError::Checkout("checkout has no HEAD commit".to_string()))?;

    info!(head = %head_sha, source = %source_sha, "Checkout complete");
    Ok(CheckoutOutcome {
        repo_dir: work_dir.to_path_buf(),
        head_sha,
        source_sha,
    })
}

async fn rev_parse(git: &GitRunner, repo_dir: &Path, rev: &str) -> Result<Option<String>> {
    git.rev_parse(repo_dir, rev)
        .await
        .map_err(|e| SyncError::Checkout(e.to_string()))
}

/// Local ref for an event ref: branch names map to `origin`'s
/// remote-tracking ref, full refs (`refs/tags/...`) are used as is.
fn checkout_target(event_ref: &str) -> Option<String> {
    match event_ref {
        "" => None,
        r if r.starts_with("refs/") => Some(r.to_string()),
        branch => Some(format!("refs/remotes/origin/{branch}")),
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path)
        .map_err(|e| SyncError::Checkout(format!("cannot resolve {}: {e}", path.display())))
}

fn prepare_work_dir(work_dir: &Path) -> Result<()> {
    if work_dir.exists() {
        let mut entries = std::fs::read_dir(work_dir).map_err(|e| {
            SyncError::Checkout(format!("cannot read {}: {e}", work_dir.display()))
        })?;
        if entries.next().is_some() {
            return Err(SyncError::Checkout(format!(
                "work directory {} is not empty",
                work_dir.display()
            )));
        }
        return Ok(());
    }
    std::fs::create_dir_all(work_dir).map_err(|e| {
        SyncError::Checkout(format!("cannot create {}: {e}", work_dir.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("a").join("b");
        prepare_work_dir(&work).unwrap();
        assert!(work.is_dir());
    }

    #[test]
    fn prepare_rejects_non_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file"), b"x").unwrap();
        assert!(matches!(
            prepare_work_dir(dir.path()),
            Err(SyncError::Checkout(_))
        ));
    }

    #[test]
    fn prepare_accepts_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(prepare_work_dir(dir.path()).is_ok());
    }

    #[test]
    fn checkout_target_maps_branches_to_origin() {
        assert_eq!(
            checkout_target("release-1").as_deref(),
            Some("refs/remotes/origin/release-1")
        );
        assert_eq!(checkout_target(""), None);
    }

    #[test]
    fn checkout_target_keeps_full_refs() {
        assert_eq!(
            checkout_target("refs/tags/v1.2.0").as_deref(),
            Some("refs/tags/v1.2.0")
        );
    }
}
