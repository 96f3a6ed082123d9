//! Pipeline error types.
//!
//! Every aggregator failure maps onto one of three fatal kinds; none of
//! them is retried, and each one fails the whole run with a non-zero
//! exit status.

use thiserror::Error;

/// Fatal errors raised by the coverage pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Coverage inputs are missing or structurally incompatible.
    #[error("merge failed: {0}")]
    Merge(String),

    /// Report generation from the merged database failed.
    #[error("render failed: {0}")]
    Render(String),

    /// The coverage service was unreachable or rejected the payload.
    #[error("upload failed: {0}")]
    Upload(String),
}

impl PipelineError {
    /// Merge error with shard context.
    pub fn merge(msg: impl Into<String>) -> Self {
        PipelineError::Merge(msg.into())
    }

    /// Render error.
    pub fn render(msg: impl Into<String>) -> Self {
        PipelineError::Render(msg.into())
    }

    /// Upload error.
    pub fn upload(msg: impl Into<String>) -> Self {
        PipelineError::Upload(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PipelineError::merge("shard format mismatch");
        assert_eq!(err.to_string(), "merge failed: shard format mismatch");

        let err = PipelineError::upload("service returned 503");
        assert_eq!(err.to_string(), "upload failed: service returned 503");
    }
}
