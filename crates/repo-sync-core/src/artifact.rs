//! Artifact storage for archived checkouts.
//!
//! - `ArtifactStore`: where named artifacts go (put by file name)
//! - `DirArtifactStore`: files under a local directory, for the CI platform
//!   to retain
//! - `MemoryArtifactStore`: in-memory fake for tests

use crate::error::{Result, SyncError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncReadExt;

const HASH_CHUNK: usize = 64 * 1024;

/// Compute the SHA-256 hex digest of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// SHA-256 hex digest and size of a file, read in chunks.
pub async fn sha256_file(path: &Path) -> std::io::Result<(String, u64)> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK];
    let mut size = 0u64;
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok((hex::encode(hasher.finalize()), size))
}

/// Where a stored artifact ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArtifact {
    /// Artifact name (e.g. `repo-archive`).
    pub name: String,

    /// File name within the store.
    pub file_name: String,

    /// Store-specific location (a path for `DirArtifactStore`).
    pub location: String,

    pub size_bytes: u64,

    /// SHA-256 hex digest of the stored bytes.
    pub digest: String,
}

/// Named artifact storage.
///
/// Guarantees:
/// - `put`/`put_file` return the SHA-256 digest of exactly the bytes stored.
/// - a second put with the same file name replaces the first.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, name: &str, file_name: &str, data: &[u8]) -> Result<StoredArtifact>;

    /// Store the contents of the local file `src`, which may be large.
    async fn put_file(&self, name: &str, file_name: &str, src: &Path) -> Result<StoredArtifact>;
}

/// Stores artifacts as files under a directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirArtifactStore {
    root: PathBuf,
}

impl DirArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate `file_name` and make sure the root exists.
    async fn target(&self, file_name: &str) -> Result<PathBuf> {
        if file_name.is_empty()
            || file_name == ".."
            || file_name.contains(|c: char| c == '/' || c == '\\')
        {
            return Err(SyncError::Archive(format!(
                "invalid artifact file name '{file_name}'"
            )));
        }

        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            SyncError::Archive(format!(
                "cannot create artifact directory {}: {e}",
                self.root.display()
            ))
        })?;
        Ok(self.root.join(file_name))
    }
}

#[async_trait]
impl ArtifactStore for DirArtifactStore {
    async fn put(&self, name: &str, file_name: &str, data: &[u8]) -> Result<StoredArtifact> {
        let path = self.target(file_name).await?;
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| SyncError::Archive(format!("cannot write {}: {e}", path.display())))?;

        Ok(StoredArtifact {
            name: name.to_string(),
            file_name: file_name.to_string(),
            location: path.to_string_lossy().to_string(),
            size_bytes: data.len() as u64,
            digest: sha256_hex(data),
        })
    }

    async fn put_file(&self, name: &str, file_name: &str, src: &Path) -> Result<StoredArtifact> {
        let path = self.target(file_name).await?;
        tokio::fs::copy(src, &path).await.map_err(|e| {
            SyncError::Archive(format!(
                "cannot copy {} to {}: {e}",
                src.display(),
                path.display()
            ))
        })?;
        let (digest, size_bytes) = sha256_file(&path)
            .await
            .map_err(|e| SyncError::Archive(format!("cannot hash {}: {e}", path.display())))?;

        Ok(StoredArtifact {
            name: name.to_string(),
            file_name: file_name.to_string(),
            location: path.to_string_lossy().to_string(),
            size_bytes,
            digest,
        })
    }
}

/// In-memory artifact store keyed by file name (testing only).
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, file_name: &str) -> Option<Vec<u8>> {
        self.files.lock().ok()?.get(file_name).cloned()
    }

    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .files
            .lock()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, name: &str, file_name: &str, data: &[u8]) -> Result<StoredArtifact> {
        let mut files = self
            .files
            .lock()
            .map_err(|_| SyncError::Archive("artifact store lock poisoned".to_string()))?;
        files.insert(file_name.to_string(), data.to_vec());
        Ok(StoredArtifact {
            name: name.to_string(),
            file_name: file_name.to_string(),
            location: format!("memory://{file_name}"),
            size_bytes: data.len() as u64,
            digest: sha256_hex(data),
        })
    }

    async fn put_file(&self, name: &str, file_name: &str, src: &Path) -> Result<StoredArtifact> {
        let data = tokio::fs::read(src)
            .await
            .map_err(|e| SyncError::Archive(format!("cannot read {}: {e}", src.display())))?;
        self.put(name, file_name, &data).await
    }
}
