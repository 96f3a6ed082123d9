//! Data models for the coverage aggregator.
//!
//! This module contains the core data structures used throughout the
//! application: parsed coverage shards, the merged coverage database,
//! and the trigger/auth context used by the upload step.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Schema metadata carried by every coverage shard.
///
/// Shards produced by different tool versions are only mergeable when
/// their `format` numbers agree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardMeta {
    /// Schema format number of the shard data.
    pub format: u32,
    /// Version string of the tool that produced the shard.
    #[serde(default)]
    pub version: String,
    /// Timestamp recorded by the producing tool, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Line coverage for a single source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCoverage {
    /// Line numbers that were executed at least once (1-indexed).
    #[serde(default)]
    pub executed_lines: BTreeSet<u32>,
    /// Coverable line numbers that were never executed.
    #[serde(default)]
    pub missing_lines: BTreeSet<u32>,
}

impl FileCoverage {
    /// Total number of coverable lines (executed + missing).
    pub fn coverable_lines(&self) -> usize {
        self.executed_lines.len() + self.missing_lines.len()
    }

    /// Coverage percentage in the range 0.0..=100.0.
    ///
    /// A file with no coverable lines reports 100%; callers that need to
    /// distinguish empty files should check `coverable_lines()` first.
    pub fn percent_covered(&self) -> f64 {
        let coverable = self.coverable_lines();
        if coverable == 0 {
            return 100.0;
        }
        (self.executed_lines.len() as f64 / coverable as f64) * 100.0
    }

    /// True when every coverable line was executed.
    pub fn is_fully_covered(&self) -> bool {
        self.missing_lines.is_empty()
    }

    /// Fold another measurement of the same file into this one.
    ///
    /// Executed lines are unioned; a line counts as missing only if no
    /// shard executed it.
    pub fn absorb(&mut self, other: &FileCoverage) {
        self.executed_lines
            .extend(other.executed_lines.iter().copied());
        self.missing_lines
            .extend(other.missing_lines.iter().copied());
        let executed = self.executed_lines.clone();
        self.missing_lines.retain(|line| !executed.contains(line));
    }
}

/// A parsed coverage artifact as produced by one test shard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageShard {
    /// Schema metadata.
    pub meta: ShardMeta,
    /// Per-file line coverage, keyed by path relative to the repo root.
    pub files: BTreeMap<String, FileCoverage>,
}

/// The merged coverage database built from all discovered shards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageData {
    /// Common schema metadata of the merged shards.
    pub meta: ShardMeta,
    /// Per-file coverage, keyed by path relative to the repo root.
    pub files: BTreeMap<String, FileCoverage>,
    /// Number of shards that were merged.
    pub shard_count: usize,
}

impl CoverageData {
    /// Total executed lines across all files.
    pub fn total_executed(&self) -> usize {
        self.files.values().map(|f| f.executed_lines.len()).sum()
    }

    /// Total coverable lines across all files.
    pub fn total_coverable(&self) -> usize {
        self.files.values().map(|f| f.coverable_lines()).sum()
    }

    /// Overall line rate in the range 0.0..=1.0.
    pub fn line_rate(&self) -> f64 {
        let coverable = self.total_coverable();
        if coverable == 0 {
            return 1.0;
        }
        self.total_executed() as f64 / coverable as f64
    }
}

/// The repository event that triggered this run.
///
/// Computed once at pipeline start and threaded through every decision
/// point; never re-derived from the environment mid-run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerContext {
    /// A direct push to the repository.
    Push,
    /// A pull request; `from_fork` is true when the head repository
    /// differs from the base repository.
    PullRequest { from_fork: bool },
    /// Any other event (workflow_dispatch, schedule, ...).
    Other(String),
}

impl TriggerContext {
    /// Whether identity-federation (OIDC) auth applies to this trigger.
    ///
    /// OIDC is available for pushes and for pull requests originating in
    /// the same repository; fork PRs cannot mint an ID token and must
    /// fall back to a stored credential.
    pub fn use_oidc(&self) -> bool {
        match self {
            TriggerContext::Push => true,
            TriggerContext::PullRequest { from_fork } => !from_fork,
            TriggerContext::Other(_) => false,
        }
    }
}

impl fmt::Display for TriggerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerContext::Push => write!(f, "push"),
            TriggerContext::PullRequest { from_fork: true } => write!(f, "pull_request (fork)"),
            TriggerContext::PullRequest { from_fork: false } => {
                write!(f, "pull_request (same repo)")
            }
            TriggerContext::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Credential used to authenticate the upload.
#[derive(Debug, Clone)]
pub enum AuthMode {
    /// Short-lived identity-federation token minted by the CI runner.
    Oidc(String),
    /// Long-lived stored secret.
    Token(String),
}

impl AuthMode {
    /// The bearer value to send with the upload request.
    pub fn bearer(&self) -> &str {
        match self {
            AuthMode::Oidc(token) | AuthMode::Token(token) => token,
        }
    }

    /// Label for logs; never includes the credential itself.
    pub fn label(&self) -> &'static str {
        match self {
            AuthMode::Oidc(_) => "oidc",
            AuthMode::Token(_) => "token",
        }
    }
}

/// Outcome of transmitting the combined report to the coverage service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResult {
    /// HTTP status code returned by the service.
    pub status: u16,
    /// Report URL returned by the service, when it provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cov(executed: &[u32], missing: &[u32]) -> FileCoverage {
        FileCoverage {
            executed_lines: executed.iter().copied().collect(),
            missing_lines: missing.iter().copied().collect(),
        }
    }

    #[test]
    fn test_percent_covered() {
        let file = cov(&[1, 2, 3], &[4]);
        assert_eq!(file.coverable_lines(), 4);
        assert!((file.percent_covered() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_file_reports_full_coverage() {
        let file = FileCoverage::default();
        assert_eq!(file.coverable_lines(), 0);
        assert!((file.percent_covered() - 100.0).abs() < f64::EPSILON);
        assert!(file.is_fully_covered());
    }

    #[test]
    fn test_absorb_unions_executed_and_clears_missing() {
        let mut a = cov(&[1, 2], &[3, 4]);
        let b = cov(&[3], &[1, 4]);
        a.absorb(&b);

        assert_eq!(a.executed_lines, [1, 2, 3].into_iter().collect());
        assert_eq!(a.missing_lines, [4].into_iter().collect());
    }

    #[test]
    fn test_trigger_context_oidc_selection() {
        assert!(TriggerContext::Push.use_oidc());
        assert!(TriggerContext::PullRequest { from_fork: false }.use_oidc());
        assert!(!TriggerContext::PullRequest { from_fork: true }.use_oidc());
        assert!(!TriggerContext::Other("schedule".to_string()).use_oidc());
    }

    #[test]
    fn test_coverage_data_totals() {
        let mut files = BTreeMap::new();
        files.insert("a.rs".to_string(), cov(&[1, 2], &[3]));
        files.insert("b.rs".to_string(), cov(&[10], &[]));

        let data = CoverageData {
            meta: ShardMeta {
                format: 2,
                version: "test".to_string(),
                timestamp: None,
            },
            files,
            shard_count: 2,
        };

        assert_eq!(data.total_executed(), 3);
        assert_eq!(data.total_coverable(), 4);
        assert!((data.line_rate() - 0.75).abs() < f64::EPSILON);
    }
}
