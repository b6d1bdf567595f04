//! Archive: store the checked-out tree as a named artifact.

use crate::artifact::ArtifactStore;
use crate::error::{Result, SyncError};
use crate::git::GitRunner;
use crate::report::ArchiveManifest;
use chrono::Utc;
use std::path::Path;
use tracing::info;

/// Archive `HEAD` of `repo_dir` as `<name>.tar` and store it with a
/// `<name>.json` manifest.
///
/// The tar is staged on disk by `git archive --output` and handed to the
/// store as a file, so its size is not bounded by memory.
pub async fn archive_checkout(
    git: &GitRunner,
    repo_dir: &Path,
    head_sha: &str,
    store: &dyn ArtifactStore,
    name: &str,
) -> Result<ArchiveManifest> {
    let file_name = format!("{name}.tar");
    let staging = tempfile::Builder::new()
        .prefix("repo-archive-")
        .tempdir()
        .map_err(|e| SyncError::Archive(format!("cannot create staging directory: {e}")))?;
    let staged = staging.path().join(&file_name);
    let output_arg = format!("--output={}", staged.display());

    let output = git
        .run(&["archive", "--format=tar", &output_arg, "HEAD"], repo_dir)
        .await
        .map_err(|e| SyncError::Archive(e.to_string()))?;
    if !output.success() {
        return Err(SyncError::Archive(format!(
            "git archive exited with code {}: {}",
            output.exit_code, output.stderr
        )));
    }

    let stored = store.put_file(name, &file_name, &staged).await?;

    let manifest = ArchiveManifest {
        artifact_name: stored.name,
        file_name: stored.file_name,
        location: stored.location,
        size_bytes: stored.size_bytes,
        digest: stored.digest,
        commit_sha: head_sha.to_string(),
        created_at: Utc::now(),
    };
    let manifest_json = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| SyncError::Archive(format!("cannot encode manifest: {e}")))?;
    store
        .put(name, &format!("{name}.json"), &manifest_json)
        .await?;

    info!(
        artifact = %manifest.artifact_name,
        bytes = manifest.size_bytes,
        digest = %manifest.digest,
        "Archive stored"
    );
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{sha256_hex, MemoryArtifactStore};
    use std::process::Command;
    use std::time::Duration;

    fn run_git(dir: &Path, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(output.status.success(), "git {args:?} failed");
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    #[tokio::test]
    async fn archive_stores_tar_and_manifest() {
        let repo = tempfile::tempdir().unwrap();
        run_git(repo.path(), &["init", "--quiet"]);
        run_git(repo.path(), &["config", "user.name", "test-user"]);
        run_git(repo.path(), &["config", "user.email", "test@example.com"]);
        std::fs::write(repo.path().join("notes.txt"), "archived\n").unwrap();
        run_git(repo.path(), &["add", "notes.txt"]);
        run_git(repo.path(), &["commit", "--quiet", "-m", "notes"]);
        let head = run_git(repo.path(), &["rev-parse", "HEAD"]);

        let store = MemoryArtifactStore::new();
        let git = GitRunner::new(Duration::from_secs(60));
        let manifest = archive_checkout(&git, repo.path(), &head, &store, "repo-archive")
            .await
            .unwrap();

        let tar = store.get("repo-archive.tar").unwrap();
        assert_eq!(manifest.digest, sha256_hex(&tar));
        assert_eq!(manifest.size_bytes, tar.len() as u64);
        assert_eq!(manifest.commit_sha, head);
        assert!(tar.windows(9).any(|w| w == b"notes.txt"));
        assert_eq!(
            store.file_names(),
            vec!["repo-archive.json".to_string(), "repo-archive.tar".to_string()]
        );
    }

    #[tokio::test]
    async fn archive_of_non_repository_fails() {
        let dir = tempfile::tempdir().unwrap();
        let git = GitRunner::new(Duration::from_secs(60));
        let err = archive_checkout(
            &git,
            dir.path(),
            "0000",
            &MemoryArtifactStore::new(),
            "repo-archive",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SyncError::Archive(_)));
    }
}
