//! REST API endpoints.
//!
//! Axum-based HTTP API for accounts, the follow graph and battle rooms.

pub mod auth;
pub mod routes;
pub mod state;

use axum::{
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::battle::{BattleError, ErrorKind};
use crate::storage::StorageError;
use routes::{accounts, battles};
use state::AppState;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    Battle(#[from] BattleError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UniqueConstraintViolation(what) => {
                ApiError::Conflict(format!("{} is already taken", what))
            }
            StorageError::NotFound(what) => ApiError::NotFound(what),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Battle(e) => {
                let status = match (e.kind(), e) {
                    (_, BattleError::InsultTooLong(_)) => StatusCode::BAD_REQUEST,
                    (ErrorKind::PreconditionFailed, _) => StatusCode::CONFLICT,
                    (ErrorKind::NotFound, _) => StatusCode::NOT_FOUND,
                    (ErrorKind::ConflictRetryable, _) => StatusCode::CONFLICT,
                    (ErrorKind::StorageError, _) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.code())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Storage details stay in the logs.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
            "Something went wrong, please try again later".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Pagination parameters.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
        }
    }
}

impl Pagination {
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size.unwrap_or(20).clamp(1, 100),
        }
    }

    pub fn offset(&self) -> u32 {
        (self.page - 1) * self.page_size
    }

    /// The slice of `items` on this page, plus its metadata.
    pub fn apply<T>(&self, items: Vec<T>) -> (Vec<T>, PaginationMeta) {
        let total = u32::try_from(items.len()).unwrap_or(u32::MAX);
        let meta = PaginationMeta::new(self, total);
        let page = items
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.page_size as usize)
            .collect();
        (page, meta)
    }
}

/// Pagination metadata in responses.
#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub page_size: u32,
    pub total_items: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationMeta {
    pub fn new(pagination: &Pagination, total_items: u32) -> Self {
        let total_pages = total_items.div_ceil(pagination.page_size);
        Self {
            page: pagination.page,
            page_size: pagination.page_size,
            total_items,
            total_pages,
            has_next: pagination.page < total_pages,
            has_prev: pagination.page > 1,
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    message: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "API is running...",
    })
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/leaderboard", get(accounts::leaderboard))
        .route("/api/accounts", post(accounts::register))
        .route(
            "/api/accounts/me",
            get(accounts::current_account).patch(accounts::update_account),
        )
        .route("/api/accounts/:id", get(accounts::get_profile))
        .route(
            "/api/accounts/:id/follow",
            post(accounts::follow).delete(accounts::unfollow),
        )
        .route("/api/accounts/:id/followers", get(accounts::followers))
        .route("/api/accounts/:id/following", get(accounts::following))
        .route("/api/accounts/:id/battles", get(battles::history))
        .route("/api/battles", post(battles::create_room))
        .route("/api/battles/join", post(battles::join_room))
        .route("/api/battles/:id", get(battles::get_room))
        .route("/api/battles/:id/moves", post(battles::submit_move))
        .route("/api/battles/:id/abandon", post(battles::abandon))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy for the configured origin ("*" allows any).
pub fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(Any);

    if origin == "*" {
        return layer.allow_origin(Any);
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            warn!("Invalid CORS origin {:?}, allowing any origin", origin);
            layer.allow_origin(Any)
        }
    }
}
