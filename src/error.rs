use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Answer generation failed: {0}")]
    Generation(String),

    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("Workflow error: {0}")]
    Workflow(String),

    #[error("Model API error: {0}")]
    ModelApi(String),

    #[error("Model API rate limited: {0}")]
    ModelRateLimited(String),

    #[error("Model API transient error: {0}")]
    ModelTransient(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether a failed external call may succeed if attempted again.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::ModelRateLimited(_) | AppError::ModelTransient(_) => true,
            AppError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
