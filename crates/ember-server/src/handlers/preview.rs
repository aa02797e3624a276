//! Preview orchestrator: one-shot, non-consuming metadata disclosure.

use crate::error::ApiError;
use crate::schema::PreviewResponse;
use crate::state::AppState;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::HeaderMap;
use axum::Json;
use ember_index::Scope;
use std::net::SocketAddr;
use tracing::instrument;

#[instrument(skip(state, headers))]
pub async fn preview(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let source_ip = crate::clientip::extract(&headers, Some(peer.ip()));

    if let ember_index::ThrottleDecision::Blocked { retry_after_seconds } =
        state.throttle.check(Scope::Preview, &source_ip.to_string()).await?
    {
        return Err(ApiError::Throttled { retry_after_seconds });
    }

    let exists = state.index.exists(&key).await?;
    if !exists {
        register_miss(&state, &source_ip.to_string()).await;
        return Err(ApiError::NotFound("File not found or link expired".into()));
    }

    let flipped = state.index.mark_previewed_once(&key).await?;
    if !flipped {
        register_miss(&state, &source_ip.to_string()).await;
        return Err(ApiError::NotFound(
            "This link has already been accessed and cannot be previewed again".into(),
        ));
    }

    let record = state
        .index
        .get(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound("File not found or link expired".into()))?;
    let ttl_seconds = state.index.get_ttl(&key).await?;
    let minutes_left = if ttl_seconds > 0 { ttl_seconds / 60 } else { 0 };

    Ok(Json(PreviewResponse {
        key: key.clone(),
        filename: record.filename.clone(),
        size: record.size,
        mime_type: record.mime_type,
        expiry: record.expiry_at,
        uses: record.uses_remaining,
        minutes_left,
        download_url: format!("/download/{key}"),
        curl_example: format!("curl -OJ http://localhost:8000/download/{key}"),
        created_at: record.created_at,
        sha256: record.sha256,
    }))
}

async fn register_miss(state: &AppState, source_ip: &str) {
    if let Err(err) = state
        .throttle
        .register_miss(
            Scope::Preview,
            source_ip,
            state.settings.failure_threshold,
            state.settings.block_window_seconds,
        )
        .await
    {
        tracing::error!(error = %err, "throttle_register_miss_failed");
    }
}
