use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::object::User;
use crate::repository::{UserRecord, UserRepository};
use crate::StorageError;

const MIN_PASSWORD_LENGTH: usize = 6;
const TOKEN_LENGTH: usize = 48;
const USERNAME_SYMBOLS: &str = "-._@+";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: String,
    pub description: String,
}

impl ValidationIssue {
    fn new(code: &str, description: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            description: description.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Validation failed: {}", .0.iter().map(|i| i.description.as_str()).collect::<Vec<_>>().join(" "))]
    Validation(Vec<ValidationIssue>),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Account is not confirmed. Please contact the system administrator")]
    AccountNotConfirmed,

    #[error("Account is locked out. Try again later")]
    LockedOut,

    #[error("Old password is required to change password")]
    OldPasswordRequired,

    #[error("New password is required to change password")]
    NewPasswordRequired,

    #[error("User not found")]
    UserNotFound,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type AccountResult<T> = std::result::Result<T, AccountError>;

#[derive(Debug, Clone)]
pub struct AccountSettings {
    pub require_account_confirmation: bool,
    pub session_hours: i64,
    /// Consecutive wrong passwords that trigger a lockout.
    pub max_failed_logins: i64,
    pub lockout_minutes: i64,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            require_account_confirmation: false,
            session_hours: 24 * 30,
            max_failed_logins: 5,
            lockout_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub access_token: String,
    /// Seconds until the token stops being accepted.
    pub expires_in: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub id: i64,
    pub username: String,
    pub is_account_confirmed: bool,
}

impl From<&UserRecord> for AccountInfo {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username.clone(),
            is_account_confirmed: record.email_confirmed,
        }
    }
}

/// User accounts and bearer sessions. Only the SHA-256 of a token is ever persisted.
pub struct AccountService {
    users: Arc<dyn UserRepository>,
    settings: AccountSettings,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserRepository>, settings: AccountSettings) -> Self {
        Self { users, settings }
    }

    pub async fn register(&self, username: &str, password: &str) -> AccountResult<AccountInfo> {
        let mut issues = Vec::new();
        if !is_valid_username(username) {
            issues.push(ValidationIssue::new(
                "InvalidUserName",
                format!("Username '{}' is invalid, can only contain letters or digits.", username),
            ));
        }
        issues.extend(password_issues(password));
        if !issues.is_empty() {
            return Err(AccountError::Validation(issues));
        }

        let password_hash = hash_password(password)?;
        match self.users.create_user(username, &password_hash).await? {
            Some(record) => {
                tracing::info!("Registered user {} ({})", record.username, record.id);
                Ok(AccountInfo::from(&record))
            }
            None => Err(AccountError::Validation(vec![ValidationIssue::new(
                "DuplicateUserName",
                format!("Username '{}' is already taken.", username),
            )])),
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> AccountResult<IssuedToken> {
        let Some(record) = self.users.find_user_by_name(username).await? else {
            return Err(AccountError::InvalidCredentials);
        };

        if self.settings.require_account_confirmation && !record.email_confirmed {
            return Err(AccountError::AccountNotConfirmed);
        }

        let now = Utc::now();
        if record.lockout_end.is_some_and(|end| end > now) {
            tracing::debug!("Login for locked out user {}", username);
            return Err(AccountError::LockedOut);
        }

        if !verify_password(&record.password_hash, password) {
            let failures = self.users.increment_failed_logins(record.id).await?;
            if failures >= self.settings.max_failed_logins {
                self.users
                    .lock_out(record.id, now + Duration::minutes(self.settings.lockout_minutes))
                    .await?;
                tracing::warn!("User {} locked out after {} failed logins", username, failures);
                return Err(AccountError::LockedOut);
            }
            tracing::debug!("Failed login for {}", username);
            return Err(AccountError::InvalidCredentials);
        }

        if record.access_failed_count > 0 || record.lockout_end.is_some() {
            self.users.reset_failed_logins(record.id).await?;
        }

        let access_token = generate_token();
        let lifetime = Duration::hours(self.settings.session_hours);
        self.users
            .create_session(&hash_token(&access_token), record.id, Utc::now() + lifetime)
            .await?;

        Ok(IssuedToken {
            access_token,
            expires_in: lifetime.num_seconds(),
        })
    }

    pub async fn logout(&self, token: &str) -> AccountResult<()> {
        self.users.delete_session(&hash_token(token)).await?;
        Ok(())
    }

    /// Resolves a bearer token to the user owning a live session.
    pub async fn authenticate(&self, token: &str) -> AccountResult<Option<User>> {
        if token.is_empty() {
            return Ok(None);
        }
        Ok(self.users.find_session_user(&hash_token(token), Utc::now()).await?)
    }

    pub async fn info(&self, user: &User) -> AccountResult<AccountInfo> {
        let record = self
            .users
            .find_user_by_id(user.id)
            .await?
            .ok_or(AccountError::UserNotFound)?;
        Ok(AccountInfo::from(&record))
    }

    pub async fn change_password(
        &self,
        user: &User,
        old_password: &str,
        new_password: &str,
    ) -> AccountResult<AccountInfo> {
        let record = self
            .users
            .find_user_by_id(user.id)
            .await?
            .ok_or(AccountError::UserNotFound)?;

        if old_password.is_empty() {
            return Err(AccountError::OldPasswordRequired);
        }
        if new_password.is_empty() {
            return Err(AccountError::NewPasswordRequired);
        }

        if !verify_password(&record.password_hash, old_password) {
            return Err(AccountError::Validation(vec![ValidationIssue::new(
                "PasswordMismatch",
                "Incorrect password.",
            )]));
        }

        let issues = password_issues(new_password);
        if !issues.is_empty() {
            return Err(AccountError::Validation(issues));
        }

        self.users
            .update_password_hash(record.id, &hash_password(new_password)?)
            .await?;
        tracing::info!("Password changed for user {}", record.id);
        Ok(AccountInfo::from(&record))
    }

    /// Administrative confirmation; returns `false` for an unknown username.
    pub async fn confirm_account(&self, username: &str) -> AccountResult<bool> {
        Ok(self.users.set_account_confirmed(username, true).await?)
    }
}

/// Letters, digits and `-._@+`.
fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || USERNAME_SYMBOLS.contains(c))
}

fn password_issues(password: &str) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        issues.push(ValidationIssue::new(
            "PasswordTooShort",
            format!("Passwords must be at least {} characters.", MIN_PASSWORD_LENGTH),
        ));
    }
    if password.chars().all(|c| c.is_alphanumeric()) {
        issues.push(ValidationIssue::new(
            "PasswordRequiresNonAlphanumeric",
            "Passwords must have at least one non alphanumeric character.",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        issues.push(ValidationIssue::new(
            "PasswordRequiresDigit",
            "Passwords must have at least one digit ('0'-'9').",
        ));
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        issues.push(ValidationIssue::new(
            "PasswordRequiresLower",
            "Passwords must have at least one lowercase ('a'-'z').",
        ));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        issues.push(ValidationIssue::new(
            "PasswordRequiresUpper",
            "Passwords must have at least one uppercase ('A'-'Z').",
        ));
    }
    issues
}

fn hash_password(plain: &str) -> std::result::Result<String, StorageError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(plain.as_bytes(), &salt)?
        .to_string())
}

fn verify_password(hash: &str, plain: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}
