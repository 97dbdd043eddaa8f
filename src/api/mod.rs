use crate::core::error::ServiceError;
use crate::infrastructure::traits::RepositoryError;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use log::error;
use serde_json::json;

pub mod appointments;
pub mod chats;
pub mod inventory;
pub mod storefront;
pub mod suppliers;
pub mod whatsapp;
pub mod workshops;

const X_ADMIN_USER: &str = "X-Admin-User";

/// Operator name forwarded by the admin gateway, which performs the actual authentication.
#[derive(Debug)]
pub struct ExtractAdmin(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ExtractAdmin
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, (StatusCode, &'static str)> {
        if let Some(admin) = parts.headers.get(X_ADMIN_USER) {
            let admin = admin
                .to_str()
                .map_err(|_| (StatusCode::BAD_REQUEST, "invalid admin user"))?
                .trim();
            if admin.is_empty() {
                return Err((StatusCode::BAD_REQUEST, "invalid admin user"));
            }
            Ok(ExtractAdmin(admin.to_owned()))
        } else {
            Err((StatusCode::BAD_REQUEST, "`X-Admin-User` header is missing"))
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        let status = match &e {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Conflict(_)
            | ServiceError::InvalidTransition { .. }
            | ServiceError::Repository(RepositoryError::Constraint) => StatusCode::CONFLICT,
            ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Internal(_) | ServiceError::Repository(RepositoryError::Database(_)) => {
                error!("{e}");
                return ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
            }
        };
        ApiError::new(status, e.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

pub fn router() -> Router {
    let admin = Router::new()
        .nest("/workshops", workshops::router())
        .nest("/appointments", appointments::router())
        .nest("/chats", chats::router())
        .nest("/inventory", inventory::router())
        .merge(suppliers::router());

    Router::new()
        .route("/health", get(health))
        .nest("/webhooks", whatsapp::router())
        .nest("/store", storefront::router())
        .nest("/admin", admin)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": env!("CARGO_PKG_NAME") }))
}
