use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::object::StoredFile;

/// Where the current request was addressed to, used for public URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub scheme: String,
    pub host: String,
    pub path_base: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaDataResponse {
    pub name: String,
    pub url: String,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
    pub uploader: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentResponse {
    pub data: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    base_url: String,
}

impl ResponseBuilder {
    pub fn new(context: &RequestContext) -> Self {
        Self {
            base_url: format!(
                "{}://{}{}",
                context.scheme,
                context.host,
                context.path_base.trim_end_matches('/')
            ),
        }
    }

    pub fn file_url(&self, id: i64) -> String {
        format!("{}/files/{}", self.base_url, id)
    }

    pub fn build_metadata(&self, file: &StoredFile) -> MetaDataResponse {
        MetaDataResponse {
            name: file.name.clone(),
            url: self.file_url(file.id),
            content_type: file.content_type.clone(),
            created_at: file.created_at,
            uploader: file.uploader.username.clone(),
            tags: file.tags.iter().map(|tag| tag.name.clone()).collect(),
        }
    }

    pub fn build_metadata_list(&self, files: &[StoredFile]) -> Vec<MetaDataResponse> {
        files.iter().map(|file| self.build_metadata(file)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Tag, User};
    use std::path::PathBuf;

    fn context(path_base: &str) -> RequestContext {
        RequestContext {
            scheme: "https".to_string(),
            host: "localhost".to_string(),
            path_base: path_base.to_string(),
        }
    }

    fn stored_file(id: i64, name: &str) -> StoredFile {
        StoredFile {
            id,
            name: name.to_string(),
            path: PathBuf::from("files/x"),
            content_type: "text/plain".to_string(),
            created_at: Utc::now(),
            uploader: User { id: 7, username: "testUser".to_string() },
            tags: vec![
                Tag { id: 1, name: "tag1".to_string() },
                Tag { id: 2, name: "tag2".to_string() },
            ],
        }
    }

    #[test]
    fn test_file_url() {
        assert_eq!(ResponseBuilder::new(&context("")).file_url(3), "https://localhost/files/3");
        assert_eq!(ResponseBuilder::new(&context("/api")).file_url(3), "https://localhost/api/files/3");
    }

    #[test]
    fn test_build_metadata() {
        let builder = ResponseBuilder::new(&context(""));
        let file = stored_file(1, "test.txt");

        let metadata = builder.build_metadata(&file);

        assert_eq!(metadata.name, "test.txt");
        assert_eq!(metadata.url, "https://localhost/files/1");
        assert_eq!(metadata.content_type, "text/plain");
        assert_eq!(metadata.created_at, file.created_at);
        assert_eq!(metadata.uploader, "testUser");
        assert_eq!(metadata.tags, vec!["tag1".to_string(), "tag2".to_string()]);
    }

    #[test]
    fn test_build_metadata_list_preserves_order() {
        let builder = ResponseBuilder::new(&context(""));
        let files = vec![stored_file(3, "c"), stored_file(1, "a"), stored_file(2, "b")];

        let names: Vec<_> = builder
            .build_metadata_list(&files)
            .into_iter()
            .map(|m| m.name)
            .collect();

        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_metadata_serializes_camel_case() {
        let builder = ResponseBuilder::new(&context(""));
        let json = serde_json::to_value(builder.build_metadata(&stored_file(1, "a"))).unwrap();

        assert!(json.get("contentType").is_some());
        assert!(json.get("createdAt").is_some());
    }
}
