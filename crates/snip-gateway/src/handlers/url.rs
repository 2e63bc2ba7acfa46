use crate::error::{AppError, Result};
use crate::extract::RequestUser;
use crate::model::{BatchItemRequest, BatchItemResponse, ShortenRequest, ShortenResponse};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use snip_core::{BatchRequest, Resolution, ShortCode, Shortened};
use tracing::{debug, warn};

fn created_status(shortened: &Shortened) -> StatusCode {
    if shortened.created {
        StatusCode::CREATED
    } else {
        StatusCode::CONFLICT
    }
}

/// `POST /` with the URL as a plain-text body.
pub async fn shorten_text_handler(
    State(state): State<AppState>,
    RequestUser(user): RequestUser,
    body: String,
) -> Result<Response> {
    let shortened = state.shortener().shorten(&user, body.trim()).await?;
    if !shortened.created {
        warn!(code = %shortened.code, "url already shortened");
    }

    Ok((created_status(&shortened), state.short_url(&shortened.code)).into_response())
}

/// `POST /api/shorten` with `{"url": "..."}`.
pub async fn shorten_json_handler(
    State(state): State<AppState>,
    RequestUser(user): RequestUser,
    payload: std::result::Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let shortened = state.shortener().shorten(&user, request.url.trim()).await?;
    if !shortened.created {
        warn!(code = %shortened.code, "url already shortened");
    }

    let response = ShortenResponse {
        result: state.short_url(&shortened.code),
    };
    Ok((created_status(&shortened), Json(response)).into_response())
}

/// `POST /api/shorten/batch`.
pub async fn shorten_batch_handler(
    State(state): State<AppState>,
    RequestUser(user): RequestUser,
    payload: std::result::Result<Json<Vec<BatchItemRequest>>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<BatchItemResponse>>)> {
    let Json(items) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let requests = items
        .into_iter()
        .map(|item| BatchRequest {
            correlation_id: item.correlation_id,
            original_url: item.original_url.trim().to_string(),
        })
        .collect();

    let responses = state
        .shortener()
        .shorten_batch(&user, requests)
        .await?
        .into_iter()
        .map(|response| BatchItemResponse {
            short_url: state.short_url(&response.code),
            correlation_id: response.correlation_id,
        })
        .collect();

    Ok((StatusCode::CREATED, Json(responses)))
}

/// `GET /{code}`: redirect to the original URL.
pub async fn redirect_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response> {
    let Ok(code) = ShortCode::new(code) else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    let response = match state.shortener().resolve(&code).await? {
        Resolution::Found(url) => {
            (StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, url)]).into_response()
        }
        Resolution::Deleted => {
            debug!(code = %code, "requested short url was deleted");
            StatusCode::GONE.into_response()
        }
        Resolution::Missing => StatusCode::NOT_FOUND.into_response(),
    };
    Ok(response)
}
