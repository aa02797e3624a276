//! Download orchestrator: decrement-then-read-then-decrypt-then-verify,
//! with a background cleanup task fired on exhaustion.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use ember_index::Scope;
use std::net::SocketAddr;
use tracing::instrument;

#[instrument(skip(state, headers))]
pub async fn download(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Result<Response, ApiError> {
    let source_ip = crate::clientip::extract(&headers, Some(peer.ip()));

    if let ember_index::ThrottleDecision::Blocked { retry_after_seconds } =
        state.throttle.check(Scope::Download, &source_ip.to_string()).await?
    {
        return Err(ApiError::Throttled { retry_after_seconds });
    }

    let remaining = state.index.decrement_uses(&key).await?;
    if remaining == -2 {
        register_miss(&state, &source_ip.to_string()).await;
        return Err(ApiError::NotFound("File not found or link expired".into()));
    }
    if remaining == -1 {
        register_miss(&state, &source_ip.to_string()).await;
        return Err(ApiError::Gone("Download limit has been reached".into()));
    }

    let record = state
        .index
        .get(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound("File not found or link expired".into()))?;
    let Some(encoded_key) = record.encryption_key.clone() else {
        return Err(ApiError::NotFound("File not found or link expired".into()));
    };

    let path = state.paths.file_path(&key, &record.filename);
    let ciphertext = tokio::fs::read(&path)
        .await
        .map_err(|e| ApiError::Transient(format!("blob read failed: {e}")))?;

    let enc_key = ember_crypto::Key::from_encoded(&encoded_key)
        .map_err(|e| ApiError::Transient(format!("stored key undecodable: {e}")))?;
    let plaintext = ember_crypto::decrypt(&ciphertext, &enc_key, None)
        .map_err(|_| ApiError::Transient("decryption failed".into()))?;

    let actual = ember_blob::sha256_hex(&plaintext);
    if actual != record.sha256 {
        return Err(ApiError::Integrity { expected: record.sha256, actual });
    }

    if remaining == 0 {
        let index = state.index.clone();
        let blob = state.blob;
        let dir = state.paths.upload_dir(&key);
        let key_for_log = key.clone();
        tokio::spawn(async move {
            if let Err(err) = index.delete(&key_for_log).await {
                tracing::error!(identifier = %key_for_log, error = %err, "post_burn_index_delete_failed");
            }
            if let Err(err) = blob.delete_directory(&dir) {
                tracing::error!(identifier = %key_for_log, error = %err, "post_burn_blob_delete_failed");
            }
        });
    }

    let mut response = (StatusCode::OK, plaintext).into_response();
    let response_headers = response.headers_mut();
    response_headers.insert(
        header::CONTENT_TYPE,
        record.mime_type.parse().unwrap_or(header::HeaderValue::from_static("application/octet-stream")),
    );
    response_headers.insert(
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{}\"", record.filename)
            .parse()
            .map_err(|_| ApiError::Transient("filename not representable as a header value".into()))?,
    );
    response_headers.insert(
        "X-SHA256",
        record.sha256.parse().map_err(|_| ApiError::Transient("sha256 not representable as a header value".into()))?,
    );
    response_headers.insert(
        header::CACHE_CONTROL,
        "no-store, no-cache, must-revalidate, max-age=0, no-transform"
            .parse()
            .map_err(|_| ApiError::Transient("cache-control header build failed".into()))?,
    );
    response_headers.insert(
        header::CONTENT_ENCODING,
        "identity".parse().map_err(|_| ApiError::Transient("content-encoding header build failed".into()))?,
    );

    Ok(response)
}

async fn register_miss(state: &AppState, source_ip: &str) {
    if let Err(err) = state
        .throttle
        .register_miss(
            Scope::Download,
            source_ip,
            state.settings.failure_threshold,
            state.settings.block_window_seconds,
        )
        .await
    {
        tracing::error!(error = %err, "throttle_register_miss_failed");
    }
}
