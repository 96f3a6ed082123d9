//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.covjoin.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Artifact discovery settings.
    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    /// Report rendering settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Upload settings.
    #[serde(default)]
    pub upload: UploadConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { verbose: false }
    }
}

/// Artifact discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Directory the per-shard artifacts were downloaded into.
    #[serde(default = "default_artifacts_dir")]
    pub dir: String,

    /// Name prefix an artifact must carry to be discovered.
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: default_artifacts_dir(),
            pattern: default_pattern(),
        }
    }
}

fn default_artifacts_dir() -> String {
    ".".to_string()
}

fn default_pattern() -> String {
    "coverage-reports-".to_string()
}

/// Report rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Path the combined XML report is written to.
    #[serde(default = "default_xml_out")]
    pub xml_out: String,

    /// Omit fully-covered files from the Markdown summary.
    #[serde(default = "default_true")]
    pub skip_covered: bool,

    /// Omit files with no coverable lines from the Markdown summary.
    #[serde(default = "default_true")]
    pub skip_empty: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            xml_out: default_xml_out(),
            skip_covered: true,
            skip_empty: true,
        }
    }
}

fn default_xml_out() -> String {
    "coverage.xml".to_string()
}

fn default_true() -> bool {
    true
}

/// Upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Coverage service ingest URL.
    #[serde(default = "default_upload_url")]
    pub url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            url: default_upload_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_upload_url() -> String {
    "https://ingest.covjoin.dev/v1/reports".to_string()
}

fn default_timeout() -> u64 {
    120
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists
    /// but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".covjoin.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with coverage CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings; optional
    /// flags only override when explicitly provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::CoverageArgs, verbose: bool) {
        // Discovery settings - always override since they have CLI defaults
        self.artifacts.dir = args.artifacts_dir.display().to_string();
        self.artifacts.pattern = args.pattern.clone();

        // Report settings
        self.report.xml_out = args.xml_out.display().to_string();

        // Optional settings - only override if provided
        if let Some(ref url) = args.upload_url {
            self.upload.url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.upload.timeout_seconds = timeout;
        }

        // Flags always override
        if verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.artifacts.pattern, "coverage-reports-");
        assert_eq!(config.report.xml_out, "coverage.xml");
        assert!(config.report.skip_covered);
        assert!(config.report.skip_empty);
        assert_eq!(config.upload.timeout_seconds, 120);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
verbose = true

[artifacts]
dir = "artifacts"
pattern = "cov-shard-"

[report]
xml_out = "merged.xml"
skip_covered = false

[upload]
url = "https://coverage.example.com/upload"
timeout_seconds = 30
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.general.verbose);
        assert_eq!(config.artifacts.dir, "artifacts");
        assert_eq!(config.artifacts.pattern, "cov-shard-");
        assert_eq!(config.report.xml_out, "merged.xml");
        assert!(!config.report.skip_covered);
        assert!(config.report.skip_empty);
        assert_eq!(config.upload.url, "https://coverage.example.com/upload");
        assert_eq!(config.upload.timeout_seconds, 30);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[artifacts]"));
        assert!(toml_str.contains("[report]"));
        assert!(toml_str.contains("[upload]"));
    }
}
