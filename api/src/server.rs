use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::any::Any;
use std::sync::Arc;
use storage::{AccountService, DiskStore, MetadataStore, TagService};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{AppState, *};
use crate::{ApiError, ApiResult};

pub struct Server {
    config: crate::Config,
    app_state: Arc<AppState>,
}

impl Server {
    pub fn new(
        config: crate::Config,
        metadata: Arc<MetadataStore>,
        store: Arc<DiskStore>,
        accounts: Arc<AccountService>,
    ) -> Self {
        let app_state = Arc::new(AppState {
            config: config.clone(),
            store,
            tags: Arc::new(TagService::new(metadata.clone())),
            files: metadata,
            accounts,
        });

        Self { config, app_state }
    }

    pub async fn start(&self) -> ApiResult<()> {
        let app = self.router();

        let addr = self.config.bind_address();
        tracing::info!("Starting API server on {}", addr);

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

        axum::serve(listener, app)
            .await
            .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    pub fn router(&self) -> Router {
        let routes = Router::new()
            .route("/account/register", post(register))
            .route("/account/login", post(login))
            .route("/account/logout", post(logout))
            .route("/account/info", get(account_info))
            .route("/account/changepassword", post(change_password))
            .route("/files", get(get_paginated_files))
            .route("/files/upload", post(upload_file))
            .route("/files/tag/:tag_name", get(get_files_by_tag))
            .route("/files/:id", get(get_file))
            .route("/files/:id/metadata", get(get_file_metadata))
            .route("/health", get(health_check))
            .layer(DefaultBodyLimit::max(self.config.max_upload_bytes))
            .with_state(self.app_state.clone());

        let path_base = self.config.path_base.trim_matches('/');
        let app = if path_base.is_empty() {
            routes
        } else {
            Router::new().nest(&format!("/{}", path_base), routes)
        };

        with_middleware(app.fallback(not_found), self.cors_layer())
    }

    fn cors_layer(&self) -> CorsLayer {
        let Some(web_url) = self.config.web_url.as_deref() else {
            return CorsLayer::permissive();
        };

        match HeaderValue::from_str(web_url.trim_end_matches('/')) {
            Ok(origin) => CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(AnyOrigin)
                .allow_headers(AnyOrigin),
            Err(e) => {
                tracing::warn!("Ignoring invalid web url {}: {}", web_url, e);
                CorsLayer::permissive()
            }
        }
    }
}

/// Panics become a 500 here, so release builds must keep unwinding.
fn with_middleware(app: Router, cors: CorsLayer) -> Router {
    app.layer(
        ServiceBuilder::new()
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    )
}

async fn not_found() -> ApiResult<Response> {
    Err(ApiError::NotFound(crate::messages::NOT_FOUND.to_string()))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    ApiError::Internal(format!("Handler panicked: {}", detail)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[test]
    fn test_handle_panic_answers_internal_error() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_panicking_handler_answers_internal_error() {
        async fn explode() -> &'static str {
            panic!("boom")
        }
        let app = with_middleware(Router::new().route("/explode", get(explode)), CorsLayer::permissive());

        let response = app
            .oneshot(Request::builder().uri("/explode").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
