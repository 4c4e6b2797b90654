use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::collections::BTreeMap;
use storage::{AccountError, FailureKind, ServiceError, ValidationIssue};
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

pub mod messages {
    pub const FILE_UPLOADED: &str = "File uploaded";
    pub const NO_FILE_UPLOADED: &str = "No file uploaded";
    pub const FILE_NOT_FOUND: &str = "File not found";
    pub const INVALID_PAGE_REQUESTED: &str = "Invalid page requested";
    pub const INVALID_TAG_NAME: &str = "Invalid tag name";
    pub const TAG_NOT_FOUND: &str = "Tag not found";
    pub const NOT_LOGGED_IN: &str = "You are not logged in";
    pub const INTERNAL_SERVER_ERROR: &str = "Internal server error";
    pub const VALIDATION_FAILED: &str = "One or more validation errors occurred.";
    pub const NOT_FOUND: &str = "Not found";
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed")]
    Validation(Vec<ValidationIssue>),

    /// The message is logged, never sent to the client.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_logged_in() -> Self {
        ApiError::Unauthorized(messages::NOT_LOGGED_IN.to_string())
    }

    pub fn file_not_found() -> Self {
        ApiError::NotFound(messages::FILE_NOT_FOUND.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FailureKind> for ApiError {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::NoFileUploaded => ApiError::BadRequest(messages::NO_FILE_UPLOADED.to_string()),
            FailureKind::InvalidTagName => ApiError::BadRequest(messages::INVALID_TAG_NAME.to_string()),
            FailureKind::TagNotFound => ApiError::NotFound(messages::TAG_NOT_FOUND.to_string()),
            FailureKind::InvalidPage => ApiError::BadRequest(messages::INVALID_PAGE_REQUESTED.to_string()),
            FailureKind::FileStorageError => ApiError::Internal(kind.to_string()),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Failure(kind) => kind.into(),
            ServiceError::Storage(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation(issues) => ApiError::Validation(issues),
            AccountError::InvalidCredentials | AccountError::AccountNotConfirmed | AccountError::LockedOut => {
                ApiError::Unauthorized(err.to_string())
            }
            AccountError::OldPasswordRequired => ApiError::Validation(vec![ValidationIssue {
                code: "OldPasswordRequired".to_string(),
                description: err.to_string(),
            }]),
            AccountError::NewPasswordRequired => ApiError::Validation(vec![ValidationIssue {
                code: "NewPasswordRequired".to_string(),
                description: err.to_string(),
            }]),
            AccountError::UserNotFound => ApiError::NotFound(err.to_string()),
            AccountError::Storage(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest(msg) | ApiError::Unauthorized(msg) | ApiError::NotFound(msg) => {
                serde_json::json!({ "error": msg })
            }
            ApiError::Validation(issues) => {
                let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();
                for issue in issues {
                    errors.entry(issue.code).or_default().push(issue.description);
                }
                serde_json::json!({ "error": messages::VALIDATION_FAILED, "errors": errors })
            }
            ApiError::Internal(msg) => {
                tracing::error!("Request failed: {}", msg);
                serde_json::json!({ "error": messages::INTERNAL_SERVER_ERROR })
            }
        };

        (status, Json(body)).into_response()
    }
}
