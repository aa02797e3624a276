//! Upload orchestrator: sniff, validate, sanitize, encrypt, save, index, with rollback
//! on an index write failure after the blob has already been saved.

use crate::error::ApiError;
use crate::schema::UploadResponse;
use crate::state::AppState;
use axum::extract::{Multipart, State};
use axum::Json;
use chrono::{Duration as ChronoDuration, Utc};
use ember_index::NewUpload;
use tracing::instrument;

struct ParsedUpload {
    bytes: Vec<u8>,
    declared_mime: Option<String>,
    filename: String,
    expiry_minutes: i64,
    uses: i64,
}

async fn parse_multipart(mut multipart: Multipart) -> Result<ParsedUpload, ApiError> {
    let mut bytes = None;
    let mut declared_mime = None;
    let mut filename = None;
    let mut expiry_minutes = None;
    let mut uses = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::ClientError(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                filename = field.file_name().map(str::to_string);
                declared_mime = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::ClientError(format!("failed to read file field: {e}")))?;
                bytes = Some(data.to_vec());
            }
            "expiry" => {
                let text = field.text().await.unwrap_or_default();
                expiry_minutes = text.parse().ok();
            }
            "uses" => {
                let text = field.text().await.unwrap_or_default();
                uses = text.parse().ok();
            }
            _ => {}
        }
    }

    let bytes = bytes.ok_or_else(|| ApiError::ClientError("missing file field".into()))?;
    let filename = filename
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApiError::ClientError("missing filename".into()))?;
    let expiry_minutes = expiry_minutes.ok_or_else(|| ApiError::ClientError("missing or invalid expiry".into()))?;
    let uses = uses.ok_or_else(|| ApiError::ClientError("missing or invalid uses".into()))?;

    Ok(ParsedUpload { bytes, declared_mime, filename, expiry_minutes, uses })
}

#[instrument(skip(state, multipart))]
pub async fn upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(axum::http::StatusCode, Json<UploadResponse>), ApiError> {
    let parsed = parse_multipart(multipart).await?;

    if !crate::config::Settings::expiry_minutes_valid(parsed.expiry_minutes) {
        return Err(ApiError::ClientError("expiry must be between 1 and 60 minutes".into()));
    }
    if !crate::config::Settings::uses_valid(parsed.uses) {
        return Err(ApiError::ClientError("uses must be between 1 and 5".into()));
    }

    let mime_type =
        ember_blob::mime::detect(&parsed.bytes, parsed.declared_mime.as_deref());

    let chain = ember_blob::ValidationChain::new()
        .with(ember_blob::SizeValidator { max_bytes: state.settings.max_file_size as usize })
        .with(ember_blob::MimeAllowlistValidator { allowed: state.settings.allowed_mime_types.clone() });
    let ctx = ember_blob::ValidationContext { mime_type: &mime_type };
    chain.validate_all(&parsed.bytes, &ctx).map_err(ApiError::ClientError)?;

    let identifier = state
        .wordlist
        .generate_unique(&state.index, ember_words::DEFAULT_WORD_COUNT, 10)
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;

    let safe_name = ember_blob::sanitizer::sanitize(&parsed.filename);
    let sha256 = ember_blob::sha256_hex(&parsed.bytes);
    let key = ember_crypto::Key::generate();
    let ciphertext = ember_crypto::encrypt(&parsed.bytes, &key);

    let path = state.paths.file_path(&identifier, &safe_name);
    state.blob.save(&ciphertext, &path)?;

    let now = Utc::now();
    let expiry_at = now + ChronoDuration::minutes(parsed.expiry_minutes);
    let new_upload = NewUpload {
        filename: safe_name.clone(),
        size: parsed.bytes.len() as u64,
        mime_type,
        sha256: sha256.clone(),
        created_at: now.to_rfc3339(),
        expiry_at: expiry_at.to_rfc3339(),
        encryption_key: key.to_encoded(),
    };
    let ttl_seconds = (parsed.expiry_minutes * 60) as u64;

    if let Err(err) = state.index.save(&identifier, &new_upload, parsed.uses, ttl_seconds).await {
        tracing::error!(identifier = %identifier, error = %err, "upload_index_write_failed_rolling_back");
        let dir = state.paths.upload_dir(&identifier);
        if let Err(cleanup_err) = state.blob.delete_directory(&dir) {
            tracing::error!(identifier = %identifier, error = %cleanup_err, "upload_rollback_failed");
        }
        return Err(ApiError::Transient(err.to_string()));
    }

    tracing::info!(identifier = %identifier, size = new_upload.size, "upload_completed");

    Ok((
        axum::http::StatusCode::CREATED,
        Json(UploadResponse {
            key: identifier.clone(),
            preview_url: format!("/preview/{identifier}"),
            download_url: format!("/download/{identifier}"),
            expiry: parsed.expiry_minutes,
            uses: parsed.uses,
            filename: safe_name,
            size: new_upload.size,
            created_at: new_upload.created_at,
            sha256,
        }),
    ))
}
