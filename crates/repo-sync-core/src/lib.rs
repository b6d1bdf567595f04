//! repo-sync core - mirror a repository's main branch on trigger
//!
//! Provides a sync job that:
//! - Evaluates the trigger (push to main or manual dispatch, allow-listed repository)
//! - Checks out the full history of the source repository
//! - Archives the checked-out tree as the `repo-archive` artifact
//! - Force-pushes the source main branch to the destination and verifies it

pub mod artifact;
pub mod config;
pub mod credentials;
pub mod error;
pub mod git;
pub mod guard;
pub mod job;
pub mod report;
pub mod steps;
pub mod telemetry;
pub mod trigger;

// Re-export key types
pub use artifact::{ArtifactStore, DirArtifactStore, MemoryArtifactStore, StoredArtifact};
pub use config::{ArchivePolicy, SyncConfig};
pub use credentials::{Destination, Remote, SyncCredentials};
pub use error::{FailureKind, Result, SyncError};
pub use guard::{GuardDecision, SkipReason, TriggerGuard};
pub use job::RepoSyncJob;
pub use report::{ArchiveManifest, JobFailure, JobReport, StepKind, StepResult, StepStatus};
pub use telemetry::init_tracing;
pub use trigger::{EventType, TriggerEvent};
