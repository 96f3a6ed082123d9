//! Cobertura XML rendering.
//!
//! Produces the machine-consumable projection of the merged coverage
//! database: one package, one class per source file, one line element
//! per coverable line.

use crate::errors::PipelineError;
use crate::models::CoverageData;
use chrono::Utc;

/// Render the merged database as a Cobertura-style XML report.
///
/// Fails when the database is empty, which means the merge step did not
/// produce anything to report.
pub fn render_xml(data: &CoverageData) -> Result<String, PipelineError> {
    if data.files.is_empty() {
        return Err(PipelineError::render(
            "coverage database is empty; nothing to render",
        ));
    }

    let mut output = String::new();

    output.push_str("<?xml version=\"1.0\" ?>\n");
    output.push_str(&format!(
        "<coverage version=\"covjoin {}\" timestamp=\"{}\" lines-valid=\"{}\" \
         lines-covered=\"{}\" line-rate=\"{:.4}\" branch-rate=\"0\" complexity=\"0\">\n",
        env!("CARGO_PKG_VERSION"),
        Utc::now().timestamp_millis(),
        data.total_coverable(),
        data.total_executed(),
        data.line_rate()
    ));

    output.push_str("  <sources>\n    <source>.</source>\n  </sources>\n");
    output.push_str("  <packages>\n");
    output.push_str(&format!(
        "    <package name=\"combined\" line-rate=\"{:.4}\" branch-rate=\"0\" complexity=\"0\">\n",
        data.line_rate()
    ));
    output.push_str("      <classes>\n");

    for (path, file) in &data.files {
        let escaped = escape(path);
        output.push_str(&format!(
            "        <class name=\"{}\" filename=\"{}\" line-rate=\"{:.4}\" complexity=\"0\">\n",
            escaped,
            escaped,
            file.percent_covered() / 100.0
        ));
        output.push_str("          <methods/>\n");
        output.push_str("          <lines>\n");

        // Coverable lines in order, executed and missing interleaved.
        let mut lines: Vec<(u32, u32)> = file
            .executed_lines
            .iter()
            .map(|&n| (n, 1))
            .chain(file.missing_lines.iter().map(|&n| (n, 0)))
            .collect();
        lines.sort_unstable();

        for (number, hits) in lines {
            output.push_str(&format!(
                "            <line number=\"{}\" hits=\"{}\"/>\n",
                number, hits
            ));
        }

        output.push_str("          </lines>\n");
        output.push_str("        </class>\n");
    }

    output.push_str("      </classes>\n");
    output.push_str("    </package>\n");
    output.push_str("  </packages>\n");
    output.push_str("</coverage>\n");

    Ok(output)
}

/// Escape an attribute value.
fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CoverageData, FileCoverage, ShardMeta};
    use std::collections::BTreeMap;

    fn make_data() -> CoverageData {
        let mut files = BTreeMap::new();
        files.insert(
            "src/a.rs".to_string(),
            FileCoverage {
                executed_lines: [1, 2, 4].into_iter().collect(),
                missing_lines: [3].into_iter().collect(),
            },
        );
        CoverageData {
            meta: ShardMeta {
                format: 2,
                version: "test".to_string(),
                timestamp: None,
            },
            files,
            shard_count: 1,
        }
    }

    #[test]
    fn test_render_xml_structure() {
        let xml = render_xml(&make_data()).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" ?>"));
        assert!(xml.contains("lines-valid=\"4\""));
        assert!(xml.contains("lines-covered=\"3\""));
        assert!(xml.contains("line-rate=\"0.7500\""));
        assert!(xml.contains("filename=\"src/a.rs\""));
        assert!(xml.contains("<line number=\"2\" hits=\"1\"/>"));
        assert!(xml.contains("<line number=\"3\" hits=\"0\"/>"));
        assert!(xml.ends_with("</coverage>\n"));
    }

    #[test]
    fn test_render_xml_empty_database_is_fatal() {
        let data = CoverageData {
            meta: ShardMeta {
                format: 2,
                version: "test".to_string(),
                timestamp: None,
            },
            files: BTreeMap::new(),
            shard_count: 0,
        };

        let err = render_xml(&data).unwrap_err();
        assert!(matches!(err, PipelineError::Render(_)));
    }

    #[test]
    fn test_escape_attribute_values() {
        assert_eq!(escape("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }
}
