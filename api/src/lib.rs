mod server;
mod handlers;
mod auth;
mod error;

pub use server::Server;
pub use handlers::AppState;
pub use auth::{bearer_token, CurrentUser};
pub use error::{messages, ApiError, ApiResult};

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub ip: IpAddr,
    pub port: u16,
    /// Prefix every route is served under, e.g. `/filehub`. Empty for the root.
    pub path_base: String,
    /// Scheme used in file URLs unless the request carries `X-Forwarded-Proto`.
    pub scheme: String,
    /// Single allowed CORS origin. Any origin is allowed when unset.
    pub web_url: Option<String>,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ip: IpAddr::from([127, 0, 0, 1]),
            port: 8080,
            path_base: String::new(),
            scheme: "http".to_string(),
            web_url: None,
            max_upload_bytes: 512 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordUpdateRequest {
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub old_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token_type: String,
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Missing values fall back to zero, which the file service rejects for `size`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<i64>,
    pub size: Option<i64>,
}
