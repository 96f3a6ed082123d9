//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Covjoin - merge sharded coverage reports and publish them from CI
///
/// Collects per-shard coverage artifacts, merges them into one report,
/// appends a Markdown summary to the CI step summary, and uploads the
/// combined XML to a coverage-tracking service. A second subcommand
/// cleans template markup out of pull-request descriptions.
///
/// Examples:
///   covjoin coverage --artifacts-dir ./downloads
///   covjoin coverage --pattern coverage-reports- --dry-run
///   covjoin coverage --no-upload --xml-out merged.xml
///   covjoin sanitize-pr --pr 1234 --repo-url https://github.com/owner/repo
///   covjoin --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Pipeline to run
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .covjoin.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Generate a default .covjoin.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// The two independent pipelines.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Merge coverage shards, render reports, upload the result
    Coverage(CoverageArgs),

    /// Strip template markup from a pull-request description
    SanitizePr(SanitizeArgs),
}

/// Arguments for the coverage aggregation pipeline.
#[derive(clap::Args, Debug, Clone)]
pub struct CoverageArgs {
    /// Directory the per-shard coverage artifacts were downloaded into
    #[arg(long, default_value = ".", value_name = "DIR")]
    pub artifacts_dir: PathBuf,

    /// Name prefix an artifact must carry to be discovered
    ///
    /// Only artifacts whose directory or file name starts with this
    /// prefix are merged.
    #[arg(long, default_value = "coverage-reports-", value_name = "PREFIX")]
    pub pattern: String,

    /// Output path for the combined XML report
    #[arg(long, default_value = "coverage.xml", value_name = "FILE")]
    pub xml_out: PathBuf,

    /// Step-summary file the Markdown table is appended to
    ///
    /// Defaults to the file the CI runner exposes. When unset, the
    /// summary is only logged.
    #[arg(long, env = "GITHUB_STEP_SUMMARY", value_name = "FILE")]
    pub summary_file: Option<PathBuf>,

    /// Coverage service ingest URL
    #[arg(long, env = "COVJOIN_URL", value_name = "URL")]
    pub upload_url: Option<String>,

    /// Stored upload credential
    ///
    /// Required for triggers that cannot use identity federation
    /// (fork pull requests, manual runs).
    #[arg(long, env = "COVJOIN_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Skip the upload step entirely
    #[arg(long)]
    pub no_upload: bool,

    /// Dry run: list discovered shards without merging or uploading
    #[arg(long)]
    pub dry_run: bool,

    /// Upload request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

/// Arguments for the PR description sanitizer.
#[derive(clap::Args, Debug, Clone)]
pub struct SanitizeArgs {
    /// Pull request number
    #[arg(long, env = "PR_NUMBER", value_name = "NUMBER")]
    pub pr: u64,

    /// Repository URL the pull request belongs to
    ///
    /// Supports HTTPS URLs (https://github.com/owner/repo) and SSH
    /// forms (git@github.com:owner/repo).
    #[arg(long, env = "GH_REPO_URL", value_name = "URL")]
    pub repo_url: String,

    /// API token used to read and update the pull request
    #[arg(long, env = "GH_TOKEN", hide_env_values = true)]
    pub token: String,

    /// GitHub API base URL
    #[arg(long, default_value = "https://api.github.com", value_name = "URL")]
    pub api_url: String,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match self.command {
            Some(Command::Coverage(ref args)) => args.validate(),
            Some(Command::SanitizePr(ref args)) => args.validate(),
            None => Err("A subcommand is required (coverage, sanitize-pr)".to_string()),
        }
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

impl CoverageArgs {
    /// Validate coverage pipeline arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.pattern.is_empty() {
            return Err("Artifact pattern must not be empty".to_string());
        }

        if !self.artifacts_dir.exists() {
            return Err(format!(
                "Artifacts directory does not exist: {}",
                self.artifacts_dir.display()
            ));
        }
        if !self.artifacts_dir.is_dir() {
            return Err(format!(
                "Artifacts path is not a directory: {}",
                self.artifacts_dir.display()
            ));
        }

        if let Some(ref url) = self.upload_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Upload URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }
}

impl SanitizeArgs {
    /// Validate sanitizer arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.pr == 0 {
            return Err("Pull request number must be at least 1".to_string());
        }

        if !self.repo_url.starts_with("https://") && !self.repo_url.starts_with("git@") {
            return Err("Repository URL must start with 'https://' or 'git@'".to_string());
        }

        if self.token.is_empty() {
            return Err("An API token is required".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_coverage_args() -> CoverageArgs {
        CoverageArgs {
            artifacts_dir: PathBuf::from("."),
            pattern: "coverage-reports-".to_string(),
            xml_out: PathBuf::from("coverage.xml"),
            summary_file: None,
            upload_url: None,
            token: None,
            no_upload: false,
            dry_run: false,
            timeout: None,
        }
    }

    fn make_args(command: Option<Command>) -> Args {
        Args {
            command,
            config: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_validation_requires_subcommand() {
        let args = make_args(None);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args(Some(Command::Coverage(make_coverage_args())));
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_empty_pattern() {
        let mut cov = make_coverage_args();
        cov.pattern = String::new();
        assert!(cov.validate().is_err());
    }

    #[test]
    fn test_validation_missing_artifacts_dir() {
        let mut cov = make_coverage_args();
        cov.artifacts_dir = PathBuf::from("/nonexistent/artifacts");
        assert!(cov.validate().is_err());
    }

    #[test]
    fn test_validation_bad_upload_url() {
        let mut cov = make_coverage_args();
        cov.upload_url = Some("ftp://coverage.example.com".to_string());
        assert!(cov.validate().is_err());

        cov.upload_url = Some("https://coverage.example.com".to_string());
        assert!(cov.validate().is_ok());
    }

    #[test]
    fn test_sanitize_validation() {
        let mut args = SanitizeArgs {
            pr: 42,
            repo_url: "https://github.com/owner/repo".to_string(),
            token: "secret".to_string(),
            api_url: "https://api.github.com".to_string(),
        };
        assert!(args.validate().is_ok());

        args.pr = 0;
        assert!(args.validate().is_err());

        args.pr = 42;
        args.repo_url = "not-a-url".to_string();
        assert!(args.validate().is_err());

        args.repo_url = "git@github.com:owner/repo".to_string();
        args.token = String::new();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args(Some(Command::Coverage(make_coverage_args())));
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
