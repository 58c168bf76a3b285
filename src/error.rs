use thiserror::Error;

/// Errors returned by submission, polling, and tracking operations.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// The prompt was empty (or whitespace-only). Rejected before any network call.
    #[error("Prompt must not be empty")]
    EmptyPrompt,

    /// The model-loaded flag is false. Rejected before any network call.
    #[error("Model is not loaded. Load a model before generating")]
    ModelNotLoaded,

    /// Generation parameters failed construction-time validation.
    #[error("Invalid generation parameters: {0}")]
    InvalidParams(String),

    /// The service rejected the submission. No task handle was created.
    #[error("Submission rejected: {0}")]
    Submission(String),

    /// The service returned a non-success HTTP status.
    #[error("Service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response was missing expected fields or undecodable.
    #[error("{0}")]
    InvalidResponse(String),

    /// Network-level request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },

    /// Registry or form-store I/O failure.
    #[error("{context}: {source}")]
    Storage {
        context: String,
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, TrackerError>;
