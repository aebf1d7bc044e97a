// src/error.rs
// Standardized error types for the review pipeline

use thiserror::Error;

/// Main error type for the review pipeline.
///
/// File-scoped errors (`Parse`, anything raised inside one file's
/// analysis) are caught at the file boundary and only reduce the number
/// of files analyzed. Workflow-scoped errors (persisting the PR record,
/// computing the decision, submitting the review) propagate to the
/// caller as the run's failure.
#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("malformed diff: {0}")]
    Parse(String),

    #[error("retrieval error: {0}")]
    Retrieval(String),

    #[error("unparsable model response: {0}")]
    ModelResponse(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("external API error: {0}")]
    ExternalApi(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the pipeline.
pub type Result<T> = std::result::Result<T, ReviewError>;
