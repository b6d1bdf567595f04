//! Error types for sync job operations

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Checkout failed: {0}")]
    Checkout(String),

    #[error("Archive failed: {0}")]
    Archive(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Push failed: {0}")]
    Push(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Which part of a job a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    CheckoutFailure,
    ArchiveFailure,
    AuthFailure,
    PushFailure,
    Config,
    Io,
    Serialization,
}

impl SyncError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SyncError::Checkout(_) => FailureKind::CheckoutFailure,
            SyncError::Archive(_) => FailureKind::ArchiveFailure,
            SyncError::Auth(_) => FailureKind::AuthFailure,
            SyncError::Push(_) => FailureKind::PushFailure,
            SyncError::Config(_) => FailureKind::Config,
            SyncError::Io(_) => FailureKind::Io,
            SyncError::Serialization(_) => FailureKind::Serialization,
        }
    }
}

/// Result type for sync job operations
pub type Result<T> = std::result::Result<T, SyncError>;
