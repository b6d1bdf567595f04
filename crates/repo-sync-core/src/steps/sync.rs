//! Sync: force-push the source `main` to the destination and verify it.

use crate::credentials::Remote;
use crate::error::{Result, SyncError};
use crate::git::{parse_ls_remote_head, GitRunner};
use crate::guard::SYNC_BRANCH;
use std::path::Path;
use tracing::info;

/// stderr fragments git and hosting platforms print on rejected credentials.
const AUTH_MARKERS: &[&str] = &[
    "authentication failed",
    "could not read username",
    "could not read password",
    "permission denied",
    "invalid username or password",
    "the requested url returned error: 401",
    "the requested url returned error: 403",
    "http 401",
    "http 403",
];

/// Map failed push/ls-remote stderr to an auth or push failure.
pub fn classify_push_failure(stderr: &str) -> SyncError {
    let lower = stderr.to_ascii_lowercase();
    if AUTH_MARKERS.iter().any(|m| lower.contains(m)) {
        SyncError::Auth(stderr.to_string())
    } else {
        SyncError::Push(stderr.to_string())
    }
}

/// Force-push `source_sha` to `refs/heads/main` on `remote`, then
/// confirm the destination `main` points at it.
///
/// Returns the destination sha.
pub async fn sync_main(
    git: &GitRunner,
    repo_dir: &Path,
    remote: &Remote,
    source_sha: &str,
) -> Result<String> {
    let branch = SYNC_BRANCH;
    let refspec = format!("{source_sha}:refs/heads/{branch}");
    info!(destination = %remote, branch = %branch, sha = %source_sha, "Pushing");

    let push = git
        .run(&["push", "--force", "--quiet", remote.url(), &refspec], repo_dir)
        .await
        .map_err(|e| SyncError::Push(e.to_string()))?;
    if !push.success() {
        return Err(classify_push_failure(&remote.redact(&push.stderr)));
    }

    let listed = git
        .ls_remote_head(repo_dir, remote.url(), branch)
        .await
        .map_err(|e| SyncError::Push(e.to_string()))?;
    if !listed.success() {
        return Err(classify_push_failure(&remote.redact(&listed.stderr)));
    }

    match parse_ls_remote_head(&listed.stdout_text(), branch) {
        Some(sha) if sha == source_sha => Ok(sha),
        Some(sha) => Err(SyncError::Push(format!(
            "destination {branch} is {sha}, expected {source_sha}"
        ))),
        None => Err(SyncError::Push(format!(
            "destination has no branch '{branch}' after push"
        ))),
    }
}
