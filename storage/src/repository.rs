use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::object::{NewStoredFile, NewTag, StoredFile, Tag, User};
use crate::Result;

/// Persistence of stored file records. No business validation happens here.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Inserts the record with its tag links and returns the assigned id.
    async fn add(&self, file: NewStoredFile) -> Result<i64>;

    async fn get_by_id(&self, id: i64) -> Result<Option<StoredFile>>;

    async fn get_all_by_tag(&self, tag_name: &str) -> Result<Vec<StoredFile>>;

    /// Ascending by id, skipping `page * page_size` records. `page` is zero-based.
    async fn get_paginated(&self, page: i64, page_size: i64) -> Result<Vec<StoredFile>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Inserts all tags in one transaction.
    async fn add_range(&self, tags: Vec<NewTag>) -> Result<Vec<Tag>>;

    async fn get_all(&self) -> Result<Vec<Tag>>;

    async fn get_by_names(&self, names: &[String]) -> Result<Vec<Tag>>;

    async fn exists_by_name(&self, name: &str) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub email_confirmed: bool,
    pub joined_at: DateTime<Utc>,
    pub access_failed_count: i64,
    pub lockout_end: Option<DateTime<Utc>>,
}

impl UserRecord {
    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
        }
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Returns `None` when the username is already taken.
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<Option<UserRecord>>;

    async fn find_user_by_name(&self, username: &str) -> Result<Option<UserRecord>>;

    async fn find_user_by_id(&self, id: i64) -> Result<Option<UserRecord>>;

    async fn update_password_hash(&self, id: i64, password_hash: &str) -> Result<()>;

    /// Returns `false` when no user has that name.
    async fn set_account_confirmed(&self, username: &str, confirmed: bool) -> Result<bool>;

    /// Counts one more failed login and returns the new count.
    async fn increment_failed_logins(&self, id: i64) -> Result<i64>;

    /// Rejects logins until `until` and clears the failure count.
    async fn lock_out(&self, id: i64, until: DateTime<Utc>) -> Result<()>;

    async fn reset_failed_logins(&self, id: i64) -> Result<()>;

    /// Also drops the user's sessions that have already expired.
    async fn create_session(&self, token_hash: &str, user_id: i64, expires_at: DateTime<Utc>) -> Result<()>;

    /// Resolves a session that has not expired at `now`. An expired session is deleted.
    async fn find_session_user(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Option<User>>;

    async fn delete_session(&self, token_hash: &str) -> Result<()>;
}
