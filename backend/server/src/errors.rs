//! Application-wide error types.
//!
//! Every operation failure maps onto one taxonomy entry and is surfaced to
//! the caller as a `{"error": "..."}` envelope with the matching status
//! code. Nothing here is retried server-side; a rejected operation leaves
//! state unchanged.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The referenced request/exchange/product does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The actor lacks the required relationship (owner/requester/participant).
    #[error("{0}")]
    Forbidden(String),

    /// A state-machine precondition was violated.
    #[error("{0}")]
    InvalidOperation(String),

    /// Malformed input, e.g. a non-numeric monetary adjustment.
    #[error("{0}")]
    InvalidArgument(String),

    /// Missing or unverifiable bearer credential.
    #[error("Token inválido")]
    Unauthorized,

    /// A concurrent mutation won the version race; the caller may retry.
    #[error("El intercambio fue modificado por otra operación")]
    Conflict,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidOperation(_) | Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Database(_) | Self::Migrate(_) | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("internal error: {self}");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
