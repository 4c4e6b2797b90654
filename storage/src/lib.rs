mod engine;
mod object;
mod metadata;
mod repository;
mod tags;
mod response;
mod service;
mod accounts;

pub use engine::{DiskStore, FileStore, UploadSpool};
pub use object::{NewStoredFile, NewTag, StoredFile, Tag, UploadBody, UploadRequest, UploadedFile, User};
pub use metadata::MetadataStore;
pub use repository::{FileRepository, TagRepository, UserRepository, UserRecord};
pub use tags::{TagRegistry, TagService};
pub use response::{ContentResponse, MetaDataResponse, RequestContext, ResponseBuilder};
pub use service::FileService;
pub use accounts::{
    AccountError, AccountInfo, AccountResult, AccountService, AccountSettings, IssuedToken, ValidationIssue,
};

use std::fmt;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Faults the core does not classify. They bubble up to the outermost boundary.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),
}

impl From<argon2::password_hash::Error> for StorageError {
    fn from(err: argon2::password_hash::Error) -> Self {
        StorageError::PasswordHash(err.to_string())
    }
}

/// The closed set of reasons a file operation can fail for business reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NoFileUploaded,
    InvalidTagName,
    TagNotFound,
    InvalidPage,
    FileStorageError,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            FailureKind::NoFileUploaded => "No file uploaded",
            FailureKind::InvalidTagName => "Invalid tag name",
            FailureKind::TagNotFound => "Tag not found",
            FailureKind::InvalidPage => "Invalid page requested",
            FailureKind::FileStorageError => "File could not be stored",
        };
        f.write_str(message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Failure(FailureKind),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ServiceError {
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            ServiceError::Failure(kind) => Some(*kind),
            ServiceError::Storage(_) => None,
        }
    }
}

impl From<FailureKind> for ServiceError {
    fn from(kind: FailureKind) -> Self {
        ServiceError::Failure(kind)
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
