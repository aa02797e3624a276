//! Status orchestrator: non-consuming state query. Unknown or expired keys
//! are reported as `expired_or_burned`, not a 404.

use crate::error::ApiError;
use crate::schema::StatusResponse;
use crate::state::AppState;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::HeaderMap;
use axum::Json;
use ember_index::Scope;
use std::net::SocketAddr;
use tracing::instrument;

#[instrument(skip(state, headers))]
pub async fn status(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Result<Json<StatusResponse>, ApiError> {
    let source_ip = crate::clientip::extract(&headers, Some(peer.ip()));

    if let ember_index::ThrottleDecision::Blocked { retry_after_seconds } =
        state.throttle.check(Scope::Status, &source_ip.to_string()).await?
    {
        return Err(ApiError::Throttled { retry_after_seconds });
    }

    let record = state.index.get(&key).await?;

    let Some(record) = record else {
        register_miss(&state, &source_ip.to_string()).await;
        return Ok(Json(StatusResponse {
            key,
            status: "expired_or_burned",
            remaining_uses: 0,
            expires_at: None,
            is_accessible: false,
        }));
    };

    let expired = chrono::DateTime::parse_from_rfc3339(&record.expiry_at)
        .map(|expiry| chrono::Utc::now() > expiry.with_timezone(&chrono::Utc))
        .unwrap_or(false);

    let (status, is_accessible) = if expired {
        ("expired", false)
    } else if record.uses_remaining > 0 {
        ("active", true)
    } else {
        ("burned", false)
    };

    Ok(Json(StatusResponse {
        key,
        status,
        remaining_uses: record.uses_remaining.max(0),
        expires_at: Some(record.expiry_at),
        is_accessible,
    }))
}

async fn register_miss(state: &AppState, source_ip: &str) {
    if let Err(err) = state
        .throttle
        .register_miss(
            Scope::Status,
            source_ip,
            state.settings.failure_threshold,
            state.settings.block_window_seconds,
        )
        .await
    {
        tracing::error!(error = %err, "throttle_register_miss_failed");
    }
}
