//! Trigger guard deciding whether a job run does anything at all.

use crate::trigger::{EventType, TriggerEvent};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The only branch whose pushes trigger a sync, and the branch synced.
pub const SYNC_BRANCH: &str = "main";

/// Why a run was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    RepositoryMismatch { expected: String, actual: String },
    BranchMismatch { expected: String, actual: String },
    UnsupportedEvent { event: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::RepositoryMismatch { expected, actual } => {
                write!(f, "repository '{actual}' is not '{expected}'")
            }
            SkipReason::BranchMismatch { expected, actual } => {
                write!(f, "push to '{actual}', only '{expected}' triggers a sync")
            }
            SkipReason::UnsupportedEvent { event } => {
                write!(f, "event '{event}' does not trigger a sync")
            }
        }
    }
}

/// Outcome of guard evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    Run,
    Skip(SkipReason),
}

impl GuardDecision {
    pub fn should_run(&self) -> bool {
        matches!(self, GuardDecision::Run)
    }
}

/// Trigger rules for the sync job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerGuard {
    /// Only this repository may run the job (`owner/name`).
    pub allowed_repository: String,
}

impl TriggerGuard {
    pub fn new(allowed_repository: impl Into<String>) -> Self {
        Self {
            allowed_repository: allowed_repository.into(),
        }
    }

    /// Evaluate an event.
    ///
    /// Rules:
    /// - the invoking repository must equal `allowed_repository`
    ///   (ASCII case-insensitive), checked first
    /// - a push must target [`SYNC_BRANCH`] exactly
    /// - a manual dispatch runs from any branch
    /// - every other event is skipped
    pub fn evaluate(&self, event: &TriggerEvent) -> GuardDecision {
        if !event
            .repository
            .eq_ignore_ascii_case(self.allowed_repository.trim())
        {
            return GuardDecision::Skip(SkipReason::RepositoryMismatch {
                expected: self.allowed_repository.clone(),
                actual: event.repository.clone(),
            });
        }

        match &event.event_type {
            EventType::Push if event.branch == SYNC_BRANCH => GuardDecision::Run,
            EventType::Push => GuardDecision::Skip(SkipReason::BranchMismatch {
                expected: SYNC_BRANCH.to_string(),
                actual: event.branch.clone(),
            }),
            EventType::Manual => GuardDecision::Run,
            EventType::Other(name) => GuardDecision::Skip(SkipReason::UnsupportedEvent {
                event: name.clone(),
            }),
        }
    }
}
