use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::Json;
use commerce_types::domain::principal::Principal;

use crate::errors::AppError;

/// Header the upstream gateway sets once it has authenticated the caller.
pub const USER_HEADER: &str = "x-user";

/// The caller, parsed from the `x-user` JSON header.
pub struct AuthUser(pub Principal);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts.headers.get(USER_HEADER).ok_or_else(|| {
            AppError::Unauthorized(format!("missing {USER_HEADER} header"))
        })?;
        let raw = raw.to_str().map_err(|_| {
            AppError::Unauthorized(format!("{USER_HEADER} header is not valid text"))
        })?;
        let principal: Principal = serde_json::from_str(raw).map_err(|e| {
            AppError::Unauthorized(format!("malformed {USER_HEADER} header: {e}"))
        })?;
        Ok(AuthUser(principal))
    }
}

/// `Json` whose rejections use the service error body.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(JsonBody(value))
    }
}
