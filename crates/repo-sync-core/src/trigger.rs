//! Trigger events delivered by the CI platform.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of event that invoked the job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A push to some ref.
    Push,

    /// Manual dispatch (`workflow_dispatch`).
    Manual,

    /// Any other platform event; never runs the job.
    Other(String),
}

impl EventType {
    /// Parse a platform event name.
    ///
    /// `workflow_dispatch` and `manual` both map to [`EventType::Manual`].
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "push" => EventType::Push,
            "workflow_dispatch" | "manual" => EventType::Manual,
            _ => EventType::Other(name.trim().to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            EventType::Push => "push",
            EventType::Manual => "manual",
            EventType::Other(name) => name,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single invocation of the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub event_type: EventType,

    /// Short branch name (`main`), or the verbatim ref when it is not a branch.
    pub branch: String,

    /// Identity of the invoking repository (`owner/name`).
    pub repository: String,

    /// Commit the event refers to, when the platform provides one.
    pub sha: Option<String>,
}

impl TriggerEvent {
    pub fn new(event_type: EventType, git_ref: &str, repository: &str) -> Self {
        Self {
            event_type,
            branch: normalize_ref(git_ref),
            repository: repository.trim().to_string(),
            sha: None,
        }
    }

    pub fn push(git_ref: &str, repository: &str) -> Self {
        Self::new(EventType::Push, git_ref, repository)
    }

    pub fn manual(git_ref: &str, repository: &str) -> Self {
        Self::new(EventType::Manual, git_ref, repository)
    }

    pub fn with_sha(mut self, sha: impl Into<String>) -> Self {
        let sha = sha.into();
        self.sha = if sha.trim().is_empty() {
            None
        } else {
            Some(sha.trim().to_string())
        };
        self
    }

    /// Build an event from GitHub Actions style variables
    /// (`GITHUB_EVENT_NAME`, `GITHUB_REF`, `GITHUB_REPOSITORY`, `GITHUB_SHA`).
    ///
    /// `lookup` abstracts over the process environment so callers and tests
    /// can supply their own source.
    pub fn from_github_vars<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let event_name = lookup("GITHUB_EVENT_NAME")?;
        let git_ref = lookup("GITHUB_REF").unwrap_or_default();
        let repository = lookup("GITHUB_REPOSITORY").unwrap_or_default();
        let event = Self::new(EventType::parse(&event_name), &git_ref, &repository);
        Some(match lookup("GITHUB_SHA") {
            Some(sha) => event.with_sha(sha),
            None => event,
        })
    }

    /// [`TriggerEvent::from_github_vars`] over the process environment.
    pub fn from_env() -> Option<Self> {
        Self::from_github_vars(|key| std::env::var(key).ok())
    }
}

/// Strip `refs/heads/` from a branch ref. Other refs (tags, pull refs) are
/// returned unchanged so they can never equal a bare branch name.
pub fn normalize_ref(git_ref: &str) -> String {
    let git_ref = git_ref.trim();
    git_ref
        .strip_prefix("refs/heads/")
        .unwrap_or(git_ref)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parse_event_names() {
        assert_eq!(EventType::parse("push"), EventType::Push);
        assert_eq!(EventType::parse("workflow_dispatch"), EventType::Manual);
        assert_eq!(EventType::parse("Manual"), EventType::Manual);
        assert_eq!(
            EventType::parse("pull_request"),
            EventType::Other("pull_request".to_string())
        );
    }

    #[test]
    fn branch_refs_are_normalized() {
        assert_eq!(normalize_ref("refs/heads/main"), "main");
        assert_eq!(normalize_ref("main"), "main");
        assert_eq!(normalize_ref("refs/heads/feature/x"), "feature/x");
        assert_eq!(normalize_ref("refs/tags/main"), "refs/tags/main");
    }

    #[test]
    fn from_github_vars_reads_all_fields() {
        let vars: HashMap<&str, &str> = [
            ("GITHUB_EVENT_NAME", "push"),
            ("GITHUB_REF", "refs/heads/main"),
            ("GITHUB_REPOSITORY", "acme/widgets"),
            ("GITHUB_SHA", "0123abcd"),
        ]
        .into_iter()
        .collect();

        let event =
            TriggerEvent::from_github_vars(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(event.event_type, EventType::Push);
        assert_eq!(event.branch, "main");
        assert_eq!(event.repository, "acme/widgets");
        assert_eq!(event.sha.as_deref(), Some("0123abcd"));
    }

    #[test]
    fn from_github_vars_requires_event_name() {
        assert!(TriggerEvent::from_github_vars(|_| None).is_none());
    }

    #[test]
    fn empty_sha_is_dropped() {
        let event = TriggerEvent::manual("main", "acme/widgets").with_sha("  ");
        assert!(event.sha.is_none());
    }
}
