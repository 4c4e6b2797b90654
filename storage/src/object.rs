use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// A tag that has not been inserted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTag {
    pub name: String,
}

impl NewTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: i64,
    pub name: String,
    pub path: PathBuf,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
    pub uploader: User,
    pub tags: Vec<Tag>,
}

/// A stored file record before the store assigns its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStoredFile {
    pub name: String,
    pub path: PathBuf,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
    pub uploader: User,
    pub tags: Vec<Tag>,
}

impl NewStoredFile {
    /// Stamps the record with the current UTC time.
    pub fn new(
        name: String,
        path: PathBuf,
        content_type: String,
        uploader: User,
        tags: Option<Vec<Tag>>,
    ) -> Self {
        Self {
            name,
            path,
            content_type,
            created_at: Utc::now(),
            uploader,
            tags: tags.unwrap_or_default(),
        }
    }
}

/// Where the bytes of an upload wait until they are saved.
#[derive(Debug, Clone)]
pub enum UploadBody {
    Memory(Bytes),
    /// Already streamed to a temporary file, removed when the last handle drops.
    Spooled { path: Arc<TempPath>, len: u64 },
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub body: UploadBody,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            body: UploadBody::Memory(data.into()),
        }
    }

    pub fn spooled(file_name: impl Into<String>, content_type: impl Into<String>, path: TempPath, len: u64) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            body: UploadBody::Spooled {
                path: Arc::new(path),
                len,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.body {
            UploadBody::Memory(data) => data.is_empty(),
            UploadBody::Spooled { len, .. } => *len == 0,
        }
    }

    /// Extension of the original file name including the leading dot, or an empty string.
    pub fn extension(&self) -> String {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file: Option<UploadedFile>,
    pub name: String,
    /// `None` when the caller sent no tags field at all.
    pub tags: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uploader() -> User {
        User { id: 1, username: "testUser".to_string() }
    }

    #[test]
    fn test_new_stored_file_stamps_creation_time() {
        let before = Utc::now();
        let file = NewStoredFile::new(
            "report".to_string(),
            PathBuf::from("files/report.pdf"),
            "application/pdf".to_string(),
            uploader(),
            None,
        );
        let after = Utc::now();

        assert!(file.created_at >= before && file.created_at <= after);
        assert_eq!(file.name, "report");
        assert_eq!(file.path, PathBuf::from("files/report.pdf"));
        assert_eq!(file.content_type, "application/pdf");
        assert_eq!(file.uploader, uploader());
        assert!(file.tags.is_empty(), "Absent tags should become an empty tag set");
    }

    #[test]
    fn test_new_stored_file_keeps_tags() {
        let tags = vec![
            Tag { id: 1, name: "tag1".to_string() },
            Tag { id: 2, name: "tag2".to_string() },
        ];
        let file = NewStoredFile::new(
            "name".to_string(),
            PathBuf::from("path"),
            "text/plain".to_string(),
            uploader(),
            Some(tags.clone()),
        );

        assert_eq!(file.tags, tags);
    }

    #[test]
    fn test_uploaded_file_extension() {
        assert_eq!(UploadedFile::new("test.jpg", "image/jpeg", vec![1]).extension(), ".jpg");
        assert_eq!(UploadedFile::new("archive.tar.gz", "application/gzip", vec![1]).extension(), ".gz");
        assert_eq!(UploadedFile::new("README", "text/plain", vec![1]).extension(), "");
    }
}
