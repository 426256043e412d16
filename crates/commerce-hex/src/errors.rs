use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use commerce_types::ports::RepoError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Duplicate(v) => AppError::Conflict(format!("{v} already exists")),
            RepoError::ProductNotFound(id) => AppError::NotFound(format!("product {id} not found")),
            RepoError::InsufficientStock(id) => {
                AppError::BadRequest(format!("insufficient stock for product {id}"))
            }
            RepoError::StaleOrder(id) => AppError::Conflict(format!(
                "order {id} was changed by another request; reload and retry"
            )),
            RepoError::DbError(msg) => AppError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    code: &'static str,
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let msg = match &self {
            AppError::BadRequest(m)
            | AppError::Unauthorized(m)
            | AppError::Forbidden(m)
            | AppError::NotFound(m)
            | AppError::Conflict(m) => m.clone(),
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                "internal error".into()
            }
        };

        let body = serde_json::to_string(&ErrorBody {
            status: "error",
            code: self.code(),
            error: msg,
        })
        .unwrap_or_else(|_| "{\"error\":\"internal serialization\"}".into());
        (self.status(), [("content-type", "application/json")], body).into_response()
    }
}
