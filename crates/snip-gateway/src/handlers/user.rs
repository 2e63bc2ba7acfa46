use crate::error::{AppError, Result};
use crate::extract::RequestUser;
use crate::model::UserUrlResponse;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use snip_core::ShortCode;
use tracing::{debug, error};

/// `GET /api/user/urls`.
pub async fn user_urls_handler(
    State(state): State<AppState>,
    RequestUser(user): RequestUser,
) -> Result<Response> {
    let urls = state.shortener().user_urls(&user).await?;
    if urls.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<UserUrlResponse> = urls
        .into_iter()
        .map(|url| UserUrlResponse {
            short_url: state.short_url(&url.code),
            original_url: url.original_url,
        })
        .collect();
    Ok(Json(body).into_response())
}

/// `DELETE /api/user/urls` with a JSON array of short codes.
///
/// Answers 202 right away; the deletion itself happens in the background.
pub async fn delete_user_urls_handler(
    State(state): State<AppState>,
    RequestUser(user): RequestUser,
    payload: std::result::Result<Json<Vec<String>>, JsonRejection>,
) -> Result<StatusCode> {
    let Json(raw_codes) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let codes: Vec<ShortCode> = raw_codes
        .into_iter()
        .filter_map(|raw| match ShortCode::new(raw) {
            Ok(code) => Some(code),
            Err(e) => {
                debug!(error = %e, "ignoring malformed code in delete request");
                None
            }
        })
        .collect();

    let deleter = state.deleter();
    tokio::spawn(async move {
        if let Err(e) = deleter.delete(&user, &codes).await {
            error!(user = %user, count = codes.len(), error = %e, "failed to delete urls");
        }
    });

    Ok(StatusCode::ACCEPTED)
}
