use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use snip_core::UserId;

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "User-Id";

/// The caller, as named by the `User-Id` header.
#[derive(Debug, Clone)]
pub struct RequestUser(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for RequestUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| UserId::new(value).ok())
            .map(RequestUser)
            .ok_or(AppError::Unauthorized)
    }
}
