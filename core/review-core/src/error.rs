//! Error types for review session operations.
//!
//! Unknown ids are not errors: staging or discarding a stale id is reported
//! as a no-op [`Outcome`](crate::registry::Outcome) instead.

use std::path::PathBuf;

use specreview_protocol::ErrorInfo;

/// All errors that can occur in specreview-core operations.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    // ─────────────────────────────────────────────────────────────────────
    // Event Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Malformed event: {0}")]
    MalformedEvent(ErrorInfo),

    #[error("Pending endpoint {id} is staged and cannot be re-documented")]
    DuplicateIdReuse { id: String },

    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<ErrorInfo> for ReviewError {
    fn from(info: ErrorInfo) -> Self {
        ReviewError::MalformedEvent(info)
    }
}

impl ReviewError {
    /// Stable code for reporting rejections to clients.
    pub fn code(&self) -> &str {
        match self {
            ReviewError::MalformedEvent(info) => &info.code,
            ReviewError::DuplicateIdReuse { .. } => "duplicate_id_reuse",
            ReviewError::ConfigMalformed { .. } => "config_malformed",
            ReviewError::Io { .. } => "io",
            ReviewError::Json { .. } => "json",
        }
    }
}

/// Convenience type alias for Results using ReviewError.
pub type Result<T> = std::result::Result<T, ReviewError>;

impl From<ReviewError> for String {
    fn from(err: ReviewError) -> String {
        err.to_string()
    }
}
