//! In-process harness: a router over a temporary database and file directory.

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use std::sync::Arc;
use storage::{AccountService, AccountSettings, DiskStore, MetadataStore};
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "Secret1!";
const BOUNDARY: &str = "filehub-test-boundary";

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }

    pub fn error(&self) -> String {
        self.json()["error"].as_str().unwrap_or_default().to_string()
    }
}

pub struct TestApp {
    pub dir: TempDir,
    pub metadata: Arc<MetadataStore>,
    pub accounts: Arc<AccountService>,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(api::Config::default(), AccountSettings::default()).await
    }

    pub async fn with_config(config: api::Config, settings: AccountSettings) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let metadata = Arc::new(MetadataStore::open(dir.path().join("filehub.sqlite3")).await.unwrap());
        let store = Arc::new(DiskStore::open(dir.path().join("files")).await.unwrap());
        let accounts = Arc::new(AccountService::new(metadata.clone(), settings));
        let router = api::Server::new(config, metadata.clone(), store, accounts.clone()).router();

        Self {
            dir,
            metadata,
            accounts,
            router,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();

        TestResponse { status, headers, body }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(request(Method::GET, uri, token).body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: serde_json::Value) -> TestResponse {
        self.send(
            request(Method::POST, uri, token)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Registers `username` with [`PASSWORD`] and returns a bearer token.
    pub async fn login_new_user(&self, username: &str) -> String {
        let registered = self
            .post_json(
                "/account/register",
                None,
                serde_json::json!({ "username": username, "password": PASSWORD }),
            )
            .await;
        assert_eq!(registered.status, StatusCode::OK, "Registration should succeed");

        let login = self
            .post_json(
                "/account/login",
                None,
                serde_json::json!({ "username": username, "password": PASSWORD }),
            )
            .await;
        assert_eq!(login.status, StatusCode::OK, "Login should succeed");

        login.json()["accessToken"].as_str().unwrap().to_string()
    }

    pub async fn upload(&self, uri: &str, token: &str, form: &UploadForm<'_>) -> TestResponse {
        self.send(
            request(Method::POST, uri, Some(token))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(form.encode()))
                .unwrap(),
        )
        .await
    }
}

pub fn request(method: Method, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "localhost");

    match token {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {}", token)),
        None => builder,
    }
}

/// A multipart upload form. `tags` parts are sent in order, one per entry.
#[derive(Default)]
pub struct UploadForm<'a> {
    pub file: Option<(&'a str, &'a str, &'a [u8])>,
    pub name: Option<&'a str>,
    pub tags: Vec<&'a str>,
}

impl<'a> UploadForm<'a> {
    pub fn text_file(name: &'a str, data: &'a [u8], tags: Vec<&'a str>) -> Self {
        Self {
            file: Some((name, "text/plain", data)),
            name: Some(name),
            tags,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();

        if let Some((file_name, content_type, data)) = self.file {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    BOUNDARY, file_name, content_type
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }

        let mut text_part = |field: &str, value: &str| {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, field, value
                )
                .as_bytes(),
            );
        };
        if let Some(name) = self.name {
            text_part("name", name);
        }
        for tag in &self.tags {
            text_part("tags", tag);
        }

        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }
}
