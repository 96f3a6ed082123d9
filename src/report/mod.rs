//! Report rendering.
//!
//! Two projections of the merged coverage database: a Cobertura-style
//! XML report for the coverage service, and a Markdown summary table
//! for the CI step summary.

pub mod summary;
pub mod xml;

pub use summary::{render_summary, SummarySink};
pub use xml::render_xml;
