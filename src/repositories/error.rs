use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("store returned status {status}")]
    Status { status: u16 },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store rejected the request: {message}")]
    Rejected { message: String },
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
