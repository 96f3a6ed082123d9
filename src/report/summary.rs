//! Markdown summary rendering and the step-summary sink.
//!
//! The human-readable projection of the merged database: one table row
//! per file, skipping files with nothing to cover and files that are
//! fully covered, plus an unconditional TOTAL row. The table is
//! appended to the CI run's step summary, a per-run append-only
//! surface written by exactly one step.

use crate::models::CoverageData;
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};

/// Render the Markdown summary table.
///
/// `skip_covered` drops fully-covered files; `skip_empty` drops files
/// with zero coverable lines. The TOTAL row always covers every file,
/// including skipped ones.
pub fn render_summary(data: &CoverageData, skip_covered: bool, skip_empty: bool) -> String {
    let mut output = String::new();

    output.push_str("## Coverage report\n\n");
    output.push_str(&format!(
        "Combined from {} shard(s).\n\n",
        data.shard_count
    ));
    output.push_str("| Name | Stmts | Miss | Cover |\n");
    output.push_str("|:--- | ---: | ---: | ---: |\n");

    for (path, file) in &data.files {
        if skip_empty && file.coverable_lines() == 0 {
            continue;
        }
        if skip_covered && file.coverable_lines() > 0 && file.is_fully_covered() {
            continue;
        }

        output.push_str(&format!(
            "| {} | {} | {} | {:.0}% |\n",
            path,
            file.coverable_lines(),
            file.missing_lines.len(),
            file.percent_covered().floor()
        ));
    }

    let total_coverable = data.total_coverable();
    let total_missing = total_coverable - data.total_executed();
    output.push_str(&format!(
        "| **TOTAL** | **{}** | **{}** | **{:.0}%** |\n",
        total_coverable,
        total_missing,
        (data.line_rate() * 100.0).floor()
    ));

    output
}

/// Single-writer append-only sink over the step-summary file.
///
/// Without a backing path (local runs) appended content is logged
/// instead of written.
pub struct SummarySink {
    path: Option<PathBuf>,
}

impl SummarySink {
    /// Create a sink over an optional step-summary path.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Append content to the sink and flush it.
    pub fn append(&self, content: &str) -> Result<()> {
        match self.path {
            Some(ref path) => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| {
                        format!("Failed to open step summary: {}", path.display())
                    })?;

                file.write_all(content.as_bytes())
                    .with_context(|| format!("Failed to append to {}", path.display()))?;
                file.flush()
                    .with_context(|| format!("Failed to flush {}", path.display()))?;

                info!("Appended summary to {}", path.display());
            }
            None => {
                debug!("No step summary file configured; logging summary");
                info!("\n{}", content);
            }
        }

        Ok(())
    }
}
