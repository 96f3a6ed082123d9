//! Shard merging.
//!
//! Combines all staged coverage data files into one in-memory coverage
//! database. Structurally incompatible inputs (missing files, bad JSON,
//! mismatched schema formats) are fatal; there is no partial merge.

use crate::errors::PipelineError;
use crate::models::{CoverageData, CoverageShard};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Merge all shard data files into one coverage database.
///
/// Executed lines are unioned per file; a line is missing only when no
/// shard executed it. Fails when there are no inputs or when the shards
/// disagree on their schema format number.
pub fn combine(paths: &[PathBuf]) -> Result<CoverageData, PipelineError> {
    if paths.is_empty() {
        return Err(PipelineError::merge(
            "no coverage data files to combine; check the artifact name pattern",
        ));
    }

    let first = parse_shard(&paths[0])?;
    let mut data = CoverageData {
        meta: first.meta,
        files: first.files,
        shard_count: 1,
    };

    for path in &paths[1..] {
        let shard = parse_shard(path)?;
        debug!(
            "Parsed shard {} ({} files, format {})",
            path.display(),
            shard.files.len(),
            shard.meta.format
        );

        if data.meta.format != shard.meta.format {
            return Err(PipelineError::merge(format!(
                "shard {} has schema format {} but earlier shards use format {}",
                path.display(),
                shard.meta.format,
                data.meta.format
            )));
        }

        for (file, coverage) in shard.files {
            data.files.entry(file).or_default().absorb(&coverage);
        }
        data.shard_count += 1;
    }

    info!(
        "Combined {} shard(s) into {} file(s), {}/{} lines executed",
        data.shard_count,
        data.files.len(),
        data.total_executed(),
        data.total_coverable()
    );

    Ok(data)
}

/// Parse one shard data file.
fn parse_shard(path: &Path) -> Result<CoverageShard, PipelineError> {
    let content = fs::read_to_string(path).map_err(|e| {
        PipelineError::merge(format!("cannot read shard {}: {}", path.display(), e))
    })?;

    serde_json::from_str(&content).map_err(|e| {
        PipelineError::merge(format!("cannot parse shard {}: {}", path.display(), e))
    })
}
