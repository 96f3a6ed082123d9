//! Trigger context detection.
//!
//! Classifies the repository event that started this run into an
//! explicit [`TriggerContext`] value. This happens exactly once, at
//! pipeline start; every later branch (notably upload auth selection)
//! consumes the computed value instead of poking at the environment.

use crate::models::TriggerContext;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

/// Environment variable naming the triggering event (`push`,
/// `pull_request`, ...).
pub const EVENT_NAME_VAR: &str = "GITHUB_EVENT_NAME";
/// Environment variable holding the `owner/repo` slug of the base repo.
pub const REPOSITORY_VAR: &str = "GITHUB_REPOSITORY";
/// Environment variable pointing at the JSON event payload on disk.
pub const EVENT_PATH_VAR: &str = "GITHUB_EVENT_PATH";

impl TriggerContext {
    /// Build the trigger context from the CI environment.
    ///
    /// Outside CI (no event name set) this resolves to
    /// `Other("manual")` so local runs behave like untrusted triggers.
    pub fn from_env() -> Result<Self> {
        let event_name = match std::env::var(EVENT_NAME_VAR) {
            Ok(name) => name,
            Err(_) => {
                debug!("{} not set, treating run as manual", EVENT_NAME_VAR);
                return Ok(TriggerContext::Other("manual".to_string()));
            }
        };

        let base_repo = std::env::var(REPOSITORY_VAR).unwrap_or_default();
        let head_repo = match std::env::var(EVENT_PATH_VAR) {
            Ok(path) => head_repo_from_payload(Path::new(&path))?,
            Err(_) => None,
        };

        Ok(Self::classify(&event_name, &base_repo, head_repo.as_deref()))
    }

    /// Classify an event name plus base/head repository slugs.
    ///
    /// A pull request whose head repository is unknown is treated as a
    /// fork: when we cannot prove the PR came from the same repository,
    /// identity federation must not be used.
    pub fn classify(event_name: &str, base_repo: &str, head_repo: Option<&str>) -> Self {
        match event_name {
            "push" => TriggerContext::Push,
            "pull_request" | "pull_request_target" => {
                let from_fork = match head_repo {
                    Some(head) => !base_repo.is_empty() && head != base_repo,
                    None => {
                        warn!("event payload has no head repository, assuming fork");
                        true
                    }
                };
                TriggerContext::PullRequest { from_fork }
            }
            other => TriggerContext::Other(other.to_string()),
        }
    }
}

/// Extract `pull_request.head.repo.full_name` from the event payload.
fn head_repo_from_payload(path: &Path) -> Result<Option<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read event payload: {}", path.display()))?;

    let payload: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse event payload: {}", path.display()))?;

    Ok(payload["pull_request"]["head"]["repo"]["full_name"]
        .as_str()
        .map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_classify_push() {
        let ctx = TriggerContext::classify("push", "owner/repo", None);
        assert_eq!(ctx, TriggerContext::Push);
        assert!(ctx.use_oidc());
    }

    #[test]
    fn test_classify_same_repo_pull_request() {
        let ctx = TriggerContext::classify("pull_request", "owner/repo", Some("owner/repo"));
        assert_eq!(ctx, TriggerContext::PullRequest { from_fork: false });
        assert!(ctx.use_oidc());
    }

    #[test]
    fn test_classify_fork_pull_request() {
        let ctx = TriggerContext::classify("pull_request", "owner/repo", Some("other/repo"));
        assert_eq!(ctx, TriggerContext::PullRequest { from_fork: true });
        assert!(!ctx.use_oidc());
    }

    #[test]
    fn test_classify_pull_request_without_head_is_fork() {
        let ctx = TriggerContext::classify("pull_request", "owner/repo", None);
        assert_eq!(ctx, TriggerContext::PullRequest { from_fork: true });
    }

    #[test]
    fn test_classify_other_event() {
        let ctx = TriggerContext::classify("schedule", "owner/repo", None);
        assert_eq!(ctx, TriggerContext::Other("schedule".to_string()));
        assert!(!ctx.use_oidc());
    }

    #[test]
    fn test_head_repo_from_payload() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"pull_request": {{"head": {{"repo": {{"full_name": "fork/repo"}}}}}}}}"#
        )
        .unwrap();

        let head = head_repo_from_payload(file.path()).unwrap();
        assert_eq!(head, Some("fork/repo".to_string()));
    }

    #[test]
    fn test_head_repo_missing_from_payload() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"ref": "refs/heads/main"}}"#).unwrap();

        let head = head_repo_from_payload(file.path()).unwrap();
        assert_eq!(head, None);
    }
}
