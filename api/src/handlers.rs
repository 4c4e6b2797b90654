use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use storage::{
    AccountService, FileRepository, FileService, FileStore, RequestContext, ResponseBuilder, TagRegistry,
    UploadRequest, UploadSpool,
};

use crate::auth::CurrentUser;
use crate::error::messages;
use crate::{
    ApiError, ApiResult, Config, LoginRequest, MessageResponse, PaginationQuery, PasswordUpdateRequest,
    RegisterRequest, TokenResponse,
};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn FileStore>,
    pub tags: Arc<dyn TagRegistry>,
    pub files: Arc<dyn FileRepository>,
    pub accounts: Arc<AccountService>,
}

impl AppState {
    fn file_service(&self, headers: &HeaderMap) -> FileService {
        FileService::new(
            self.store.clone(),
            self.tags.clone(),
            self.files.clone(),
            ResponseBuilder::new(&request_context(headers, &self.config)),
        )
    }
}

/// Scheme and host the client used, honouring a reverse proxy's forwarded headers.
pub fn request_context(headers: &HeaderMap, config: &Config) -> RequestContext {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    RequestContext {
        scheme: header_str("x-forwarded-proto").unwrap_or_else(|| config.scheme.clone()),
        host: header_str("x-forwarded-host")
            .or_else(|| header_str(header::HOST.as_str()))
            .unwrap_or_else(|| config.bind_address()),
        path_base: config.path_base.clone(),
    }
}

fn parse_file_id(id: &str) -> ApiResult<i64> {
    id.parse().map_err(|_| ApiError::file_not_found())
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<StatusCode> {
    state.accounts.register(&request.username, &request.password).await?;
    Ok(StatusCode::OK)
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let token = state.accounts.login(&request.username, &request.password).await?;
    tracing::info!("User {} logged in", request.username);

    Ok(Json(TokenResponse {
        token_type: "Bearer".to_string(),
        access_token: token.access_token,
        expires_in: token.expires_in,
    }))
}

pub async fn logout(State(state): State<Arc<AppState>>, current: CurrentUser) -> ApiResult<StatusCode> {
    state.accounts.logout(&current.token).await?;
    Ok(StatusCode::OK)
}

pub async fn account_info(State(state): State<Arc<AppState>>, current: CurrentUser) -> ApiResult<Response> {
    let info = state.accounts.info(&current.user).await?;
    Ok(Json(info).into_response())
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(request): Json<PasswordUpdateRequest>,
) -> ApiResult<Response> {
    let info = state
        .accounts
        .change_password(&current.user, &request.old_password, &request.new_password)
        .await?;
    Ok(Json(info).into_response())
}

/// Reads the `file`, `name` and repeated `tags` parts of an upload form. The file part is
/// streamed into a spool under `spool_directory` rather than buffered.
async fn read_upload_form(
    mut multipart: Multipart,
    spool_directory: &std::path::Path,
) -> ApiResult<UploadRequest> {
    let mut file = None;
    let mut name = None;
    let mut tags: Option<Vec<String>> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let field_name = field.name().unwrap_or_default().to_string();

        match field_name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();

                let mut spool = UploadSpool::create_in(spool_directory).map_err(spool_error)?;
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?
                {
                    spool.write_chunk(&chunk).await.map_err(spool_error)?;
                }
                file = Some(spool.finish(file_name, content_type).await.map_err(spool_error)?);
            }
            "name" => {
                name = Some(field.text().await.map_err(|e| ApiError::BadRequest(e.body_text()))?);
            }
            "tags" => {
                let value = field.text().await.map_err(|e| ApiError::BadRequest(e.body_text()))?;
                let list = tags.get_or_insert_with(Vec::new);
                if !value.trim().is_empty() {
                    list.push(value);
                }
            }
            _ => {}
        }
    }

    let name = name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("The name field is required.".to_string()))?;

    Ok(UploadRequest { file, name, tags })
}

fn spool_error(err: std::io::Error) -> ApiError {
    ApiError::Internal(format!("Upload spool failed: {}", err))
}

pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    current: CurrentUser,
    multipart: Multipart,
) -> ApiResult<Json<MessageResponse>> {
    let request = read_upload_form(multipart, &state.store.file_directory()).await?;
    let file_name = request
        .file
        .as_ref()
        .map(|f| f.file_name.clone())
        .unwrap_or_default();
    tracing::info!("File {} upload requested by {}", file_name, current.user.username);

    if let Err(e) = state.file_service(&headers).upload(request, &current.user).await {
        tracing::error!("File {} upload failed for {}: {}", file_name, current.user.username, e);
        return Err(e.into());
    }

    tracing::info!("File {} uploaded by {}", file_name, current.user.username);
    Ok(Json(MessageResponse {
        message: messages::FILE_UPLOADED.to_string(),
    }))
}

pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    _current: CurrentUser,
) -> ApiResult<Response> {
    let id = parse_file_id(&id)?;
    let content = state
        .file_service(&headers)
        .get_content_by_id(id)
        .await?
        .ok_or_else(ApiError::file_not_found)?;

    Ok(([(header::CONTENT_TYPE, content.content_type)], content.data).into_response())
}

pub async fn get_file_metadata(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    _current: CurrentUser,
) -> ApiResult<Response> {
    let id = parse_file_id(&id)?;
    let metadata = state
        .file_service(&headers)
        .get_metadata_by_id(id)
        .await?
        .ok_or_else(ApiError::file_not_found)?;

    Ok(Json(metadata).into_response())
}

pub async fn get_files_by_tag(
    State(state): State<Arc<AppState>>,
    Path(tag_name): Path<String>,
    headers: HeaderMap,
    _current: CurrentUser,
) -> ApiResult<Response> {
    let files = state
        .file_service(&headers)
        .get_all_by_tag(&tag_name)
        .await?
        .unwrap_or_default();

    Ok(Json(files).into_response())
}

pub async fn get_paginated_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PaginationQuery>,
    headers: HeaderMap,
    _current: CurrentUser,
) -> ApiResult<Response> {
    let files = state
        .file_service(&headers)
        .get_paginated(query.page.unwrap_or(0), query.size.unwrap_or(0))
        .await?;

    Ok(Json(files).into_response())
}
