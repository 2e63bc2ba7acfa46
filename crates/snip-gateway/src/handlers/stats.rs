use crate::error::{AppError, Result};
use crate::model::StatsResponse;
use crate::state::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use std::net::IpAddr;
use tracing::warn;

pub const REAL_IP_HEADER: &str = "X-Real-IP";

/// `GET /api/internal/stats`.
pub async fn stats_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StatsResponse>> {
    if let Some(subnet) = state.trusted_subnet() {
        let client = headers
            .get(REAL_IP_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<IpAddr>().ok());

        if !client.is_some_and(|ip| subnet.contains(ip)) {
            warn!(client = ?client, subnet = %subnet, "stats requested from untrusted address");
            return Err(AppError::Forbidden);
        }
    }

    let stats = state.shortener().stats().await?;
    Ok(Json(StatsResponse {
        urls: stats.urls,
        users: stats.users,
    }))
}
