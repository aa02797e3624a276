//! JSON response bodies for the HTTP surface.

use serde::Serialize;

#[derive(Serialize)]
pub struct UploadResponse {
    pub key: String,
    pub preview_url: String,
    pub download_url: String,
    pub expiry: i64,
    pub uses: i64,
    pub filename: String,
    pub size: u64,
    pub created_at: String,
    pub sha256: String,
}

#[derive(Serialize)]
pub struct PreviewResponse {
    pub key: String,
    pub filename: String,
    pub size: u64,
    pub mime_type: String,
    pub expiry: String,
    pub uses: i64,
    pub minutes_left: i64,
    pub download_url: String,
    pub curl_example: String,
    pub created_at: String,
    pub sha256: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub key: String,
    pub status: &'static str,
    pub remaining_uses: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    pub is_accessible: bool,
}

#[derive(Serialize)]
pub struct ServiceStates {
    pub redis: bool,
    pub storage: bool,
    pub scheduler: bool,
    pub diceware: bool,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    pub services: ServiceStates,
    pub uptime_seconds: u64,
    pub started_at: String,
}
