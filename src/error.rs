use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilehubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Account error: {0}")]
    Account(#[from] storage::AccountError),

    #[error("API error: {0}")]
    Api(#[from] api::ApiError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Server error: {0}")]
    Server(String),
}

pub type Result<T> = std::result::Result<T, FilehubError>;
