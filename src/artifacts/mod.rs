//! Coverage artifact discovery and staging.
//!
//! Upstream test jobs each upload one coverage artifact named with a
//! common prefix. This module finds every matching artifact under the
//! download directory and stages the shard data files into a single
//! working directory without overwriting distinct files.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A shard data file found inside a matching artifact.
#[derive(Debug, Clone)]
pub struct DiscoveredShard {
    /// Name of the artifact the file came from.
    pub artifact: String,
    /// Absolute path of the data file.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
}

/// Staged shard files plus the directory handle keeping them alive.
pub struct StagedShards {
    /// Temporary working directory (dropped with this value).
    _dir: TempDir,
    /// Paths of the staged shard files.
    pub paths: Vec<PathBuf>,
}

/// Finds and stages coverage artifacts by name prefix.
pub struct ArtifactStore {
    root: PathBuf,
    pattern: String,
}

impl ArtifactStore {
    /// Create a store over a download directory and a name prefix.
    pub fn new(root: PathBuf, pattern: String) -> Self {
        Self { root, pattern }
    }

    /// Discover shard data files in all matching artifacts.
    ///
    /// A top-level entry matches when its name starts with the
    /// configured prefix. Matching directories contribute every regular
    /// file they contain; a matching top-level file is itself a shard.
    /// Results are sorted by path so runs are deterministic.
    pub fn discover(&self) -> Result<Vec<DiscoveredShard>> {
        let mut shards = Vec::new();

        let entries = fs::read_dir(&self.root).with_context(|| {
            format!("Failed to read artifacts directory: {}", self.root.display())
        })?;

        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(&self.pattern) {
                debug!("Skipping non-matching entry: {}", name);
                continue;
            }

            let path = entry.path();
            if path.is_dir() {
                self.collect_dir(&name, &path, &mut shards);
            } else if path.is_file() {
                if let Ok(metadata) = entry.metadata() {
                    shards.push(DiscoveredShard {
                        artifact: name,
                        path,
                        size: metadata.len(),
                    });
                }
            }
        }

        shards.sort_by(|a, b| a.path.cmp(&b.path));
        info!(
            "Discovered {} shard file(s) matching '{}*'",
            shards.len(),
            self.pattern
        );

        Ok(shards)
    }

    /// Collect every regular file below an artifact directory.
    fn collect_dir(&self, artifact: &str, dir: &Path, shards: &mut Vec<DiscoveredShard>) {
        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            match entry.metadata() {
                Ok(metadata) => shards.push(DiscoveredShard {
                    artifact: artifact.to_string(),
                    path: entry.path().to_path_buf(),
                    size: metadata.len(),
                }),
                Err(e) => warn!("Cannot stat {}: {}", entry.path().display(), e),
            }
        }
    }

    /// Stage discovered shards into one working directory.
    ///
    /// Files keep their names. A name collision with identical content
    /// is skipped; a collision with different content gets a numeric
    /// suffix so no distinct file is overwritten.
    pub fn stage(&self, shards: &[DiscoveredShard], show_progress: bool) -> Result<StagedShards> {
        let dir = TempDir::new().context("Failed to create staging directory")?;
        let mut paths = Vec::new();

        let progress = if show_progress {
            let pb = ProgressBar::new(shards.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} staged")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        for shard in shards {
            let name = shard
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "shard".to_string());

            match self.stage_one(dir.path(), &name, &shard.path)? {
                Some(dest) => paths.push(dest),
                None => debug!("Skipped duplicate shard file: {}", name),
            }

            if let Some(ref pb) = progress {
                pb.inc(1);
            }
        }

        if let Some(pb) = progress {
            pb.finish_with_message("Staging complete");
        }

        info!("Staged {} shard file(s)", paths.len());
        Ok(StagedShards { _dir: dir, paths })
    }

    /// Copy one shard file into the staging directory.
    ///
    /// Returns `Ok(None)` for an identical duplicate.
    fn stage_one(&self, dir: &Path, name: &str, source: &Path) -> Result<Option<PathBuf>> {
        let mut dest = dir.join(name);

        if dest.exists() {
            let existing = fs::read(&dest).with_context(|| {
                format!("Failed to read staged file: {}", dest.display())
            })?;
            let incoming = fs::read(source).with_context(|| {
                format!("Failed to read shard file: {}", source.display())
            })?;

            if existing == incoming {
                return Ok(None);
            }

            // Distinct content under the same name: disambiguate.
            let mut suffix = 1u32;
            loop {
                let candidate = dir.join(format!("{}.{}", name, suffix));
                if !candidate.exists() {
                    dest = candidate;
                    break;
                }
                suffix += 1;
            }
        }

        fs::copy(source, &dest).with_context(|| {
            format!(
                "Failed to stage {} -> {}",
                source.display(),
                dest.display()
            )
        })?;

        Ok(Some(dest))
    }
}
