use thiserror::Error;

/// Error taxonomy shared across the broker.
///
/// Kinds map onto HTTP statuses at the server boundary: `InvalidInput` →
/// 422, `NotFound` → 404, `PoolUnavailable` → 503. Store failures inside
/// worker jobs are logged and handed to the job retry discipline instead.
#[derive(Error, Debug)]
pub enum TriageError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("worker pool unavailable: {0}")]
    PoolUnavailable(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
