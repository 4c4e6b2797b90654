use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{FromRow, SqlitePool};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::object::{NewStoredFile, NewTag, StoredFile, Tag, User};
use crate::repository::{FileRepository, TagRepository, UserRecord, UserRepository};
use crate::Result;

const SELECT_STORED_FILES: &str = "SELECT f.id, f.name, f.path, f.content_type, f.created_at, \
     f.uploader_id, u.username AS uploader_name \
     FROM stored_files f INNER JOIN users u ON u.id = f.uploader_id";

const SELECT_USERS: &str = "SELECT id, username, password_hash, email_confirmed, joined_at, \
     access_failed_count, lockout_end FROM users";

/// Upper bound on `?` placeholders per `IN (...)` list. SQLite refuses statements with more
/// than 32766 bound variables.
const MAX_BIND_CHUNK: usize = 500;

/// SQLite-backed store for files, tags, users and sessions.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct StoredFileRow {
    id: i64,
    name: String,
    path: String,
    content_type: String,
    created_at: DateTime<Utc>,
    uploader_id: i64,
    uploader_name: String,
}

#[derive(FromRow)]
struct FileTagRow {
    stored_file_id: i64,
    id: i64,
    name: String,
}

impl MetadataStore {
    /// Opens (creating if needed) the database at `path` and applies migrations.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        tracing::info!("Metadata store opened at {}", path.display());
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Loads the tags of the given rows, one query per chunk of ids, and assembles the records.
    async fn attach_tags(&self, rows: Vec<StoredFileRow>) -> Result<Vec<StoredFile>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut tags_by_file: HashMap<i64, Vec<Tag>> = HashMap::new();
        for chunk in rows.chunks(MAX_BIND_CHUNK) {
            let sql = format!(
                "SELECT sft.stored_file_id, t.id, t.name \
                 FROM stored_file_tags sft INNER JOIN tags t ON t.id = sft.tag_id \
                 WHERE sft.stored_file_id IN ({}) ORDER BY t.id",
                placeholders(chunk.len())
            );
            let mut query = sqlx::query_as::<_, FileTagRow>(&sql);
            for row in chunk {
                query = query.bind(row.id);
            }

            for tag in query.fetch_all(&self.pool).await? {
                tags_by_file
                    .entry(tag.stored_file_id)
                    .or_default()
                    .push(Tag { id: tag.id, name: tag.name });
            }
        }

        Ok(rows
            .into_iter()
            .map(|row| StoredFile {
                tags: tags_by_file.remove(&row.id).unwrap_or_default(),
                id: row.id,
                name: row.name,
                path: PathBuf::from(row.path),
                content_type: row.content_type,
                created_at: row.created_at,
                uploader: User {
                    id: row.uploader_id,
                    username: row.uploader_name,
                },
            })
            .collect())
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(",")
}

#[async_trait]
impl FileRepository for MetadataStore {
    async fn add(&self, file: NewStoredFile) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query(
            "INSERT INTO stored_files (name, path, content_type, created_at, uploader_id) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&file.name)
        .bind(file.path.to_string_lossy().into_owned())
        .bind(&file.content_type)
        .bind(file.created_at)
        .bind(file.uploader.id)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for tag in &file.tags {
            sqlx::query("INSERT OR IGNORE INTO stored_file_tags (stored_file_id, tag_id) VALUES (?, ?)")
                .bind(id)
                .bind(tag.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<StoredFile>> {
        let sql = format!("{} WHERE f.id = ?", SELECT_STORED_FILES);
        let row = sqlx::query_as::<_, StoredFileRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.attach_tags(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn get_all_by_tag(&self, tag_name: &str) -> Result<Vec<StoredFile>> {
        let sql = format!(
            "{} WHERE EXISTS (SELECT 1 FROM stored_file_tags sft INNER JOIN tags t ON t.id = sft.tag_id \
             WHERE sft.stored_file_id = f.id AND t.name = ?) ORDER BY f.id",
            SELECT_STORED_FILES
        );
        let rows = sqlx::query_as::<_, StoredFileRow>(&sql)
            .bind(tag_name)
            .fetch_all(&self.pool)
            .await?;

        self.attach_tags(rows).await
    }

    async fn get_paginated(&self, page: i64, page_size: i64) -> Result<Vec<StoredFile>> {
        // An offset past i64::MAX is necessarily past the last row.
        let Some(offset) = page.checked_mul(page_size) else {
            return Ok(Vec::new());
        };

        let sql = format!("{} ORDER BY f.id LIMIT ? OFFSET ?", SELECT_STORED_FILES);
        let rows = sqlx::query_as::<_, StoredFileRow>(&sql)
            .bind(page_size)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        self.attach_tags(rows).await
    }
}

#[async_trait]
impl TagRepository for MetadataStore {
    async fn add_range(&self, tags: Vec<NewTag>) -> Result<Vec<Tag>> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(tags.len());

        for tag in tags {
            let id = sqlx::query("INSERT INTO tags (name) VALUES (?)")
                .bind(&tag.name)
                .execute(&mut *tx)
                .await?
                .last_insert_rowid();
            created.push(Tag { id, name: tag.name });
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn get_all(&self) -> Result<Vec<Tag>> {
        let rows = sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM tags ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id, name)| Tag { id, name }).collect())
    }

    async fn get_by_names(&self, names: &[String]) -> Result<Vec<Tag>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut tags = Vec::new();
        for chunk in names.chunks(MAX_BIND_CHUNK) {
            let sql = format!("SELECT id, name FROM tags WHERE name IN ({})", placeholders(chunk.len()));
            let mut query = sqlx::query_as::<_, (i64, String)>(&sql);
            for name in chunk {
                query = query.bind(name);
            }
            let rows = query.fetch_all(&self.pool).await?;
            tags.extend(rows.into_iter().map(|(id, name)| Tag { id, name }));
        }

        tags.sort_by_key(|tag| tag.id);
        Ok(tags)
    }

    async fn exists_by_name(&self, name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tags WHERE name = ?)")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

#[async_trait]
impl UserRepository for MetadataStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<Option<UserRecord>> {
        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, email_confirmed, joined_at) VALUES (?, ?, 0, ?) \
             ON CONFLICT(username) DO NOTHING",
        )
        .bind(username)
        .bind(password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_user_by_id(result.last_insert_rowid()).await
    }

    async fn find_user_by_name(&self, username: &str) -> Result<Option<UserRecord>> {
        let sql = format!("{} WHERE username = ?", SELECT_USERS);
        let user = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<UserRecord>> {
        let sql = format!("{} WHERE id = ?", SELECT_USERS);
        let user = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_password_hash(&self, id: i64, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_account_confirmed(&self, username: &str, confirmed: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET email_confirmed = ? WHERE username = ?")
            .bind(confirmed)
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment_failed_logins(&self, id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "UPDATE users SET access_failed_count = access_failed_count + 1 WHERE id = ? \
             RETURNING access_failed_count",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn lock_out(&self, id: i64, until: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET access_failed_count = 0, lockout_end = ? WHERE id = ?")
            .bind(until)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reset_failed_logins(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET access_failed_count = 0, lockout_end = NULL WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_session(&self, token_hash: &str, user_id: i64, expires_at: DateTime<Utc>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        sqlx::query("DELETE FROM sessions WHERE user_id = ? AND expires_at <= ?")
            .bind(user_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
            .bind(token_hash)
            .bind(user_id)
            .bind(now)
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_session_user(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, (i64, String, DateTime<Utc>)>(
            "SELECT u.id, u.username, s.expires_at FROM sessions s INNER JOIN users u ON u.id = s.user_id \
             WHERE s.token_hash = ?",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((id, username, expires_at)) if expires_at > now => Ok(Some(User { id, username })),
            Some(_) => {
                self.delete_session(token_hash).await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete_session(&self, token_hash: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
