use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use snip_core::{ShortenerError, StorageError};
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing User-Id header")]
    Unauthorized,
    #[error("client address is not trusted")]
    Forbidden,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Shortener(#[from] ShortenerError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Shortener(e) => match e {
                ShortenerError::InvalidUrl(_)
                | ShortenerError::InvalidShortCode(_)
                | ShortenerError::InvalidUserId(_) => StatusCode::BAD_REQUEST,
                ShortenerError::Storage(StorageError::UrlConflict(_)) => StatusCode::CONFLICT,
                ShortenerError::Storage(StorageError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
                ShortenerError::Storage(StorageError::Unavailable(_))
                | ShortenerError::GenerationExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
                ShortenerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        };

        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        (status, self.to_string()).into_response()
    }
}
