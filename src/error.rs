use thiserror::Error;

/// Failures that can end a generation attempt. Everything except `Config`
/// is recoverable at the per-group boundary: the orchestrator converts it
/// into a terminal group status and moves on to the next group.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("missing required configuration: {0}")]
    Config(String),

    #[error("upstream error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    #[error("failed to parse article JSON: {0}")]
    Parse(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Persistence(#[from] sqlx::Error),
}
