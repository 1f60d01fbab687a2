//! Domain error taxonomy and its single mapping to HTTP responses.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::{error, warn};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Validation(String),
    #[error("only {remaining} portion(s) left")]
    CapacityExceeded { remaining: i32 },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Persistence(#[from] sqlx::Error),
    #[error("{0}")]
    Dependency(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::CapacityExceeded { .. } => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Persistence(e) if is_unreachable(e) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Dependency(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// User-facing message. Store failures get distinct wording depending on
    /// whether the database was unreachable or rejected the write, since the
    /// remedy differs.
    fn message(&self) -> String {
        match self {
            ApiError::Persistence(e) if is_unreachable(e) => {
                "could not reach the database; check your connection and try again".into()
            }
            ApiError::Persistence(_) => "the database rejected the operation".into(),
            ApiError::Internal(_) => "internal error".into(),
            other => other.to_string(),
        }
    }
}

fn is_unreachable(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, %status, "request failed");
        } else {
            warn!(error = %self, %status, "request rejected");
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}
