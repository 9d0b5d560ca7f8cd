#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid identifier: {0:?}")]
    InvalidId(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
