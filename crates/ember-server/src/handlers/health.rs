//! Health reporter: four subsystem checks plus process uptime.

use crate::schema::{HealthResponse, ServiceStates};
use crate::state::AppState;
use axum::extract::State;
use axum::Json;

const HEARTBEAT_FRESHNESS_SECONDS: i64 = 180;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let redis_ok = state.index.ping().await.is_ok();
    let storage_ok = storage_writable(&state);
    let scheduler_ok = scheduler_fresh(&state).await;
    let diceware_ok = state.wordlist.len() == ember_words::REQUIRED_WORD_COUNT;

    let status = if redis_ok && storage_ok && diceware_ok { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: ember_core::ids::now_rfc3339(),
        services: ServiceStates { redis: redis_ok, storage: storage_ok, scheduler: scheduler_ok, diceware: diceware_ok },
        uptime_seconds: state.uptime.uptime_seconds(),
        started_at: state.uptime.started_at().to_rfc3339(),
    })
}

fn storage_writable(state: &AppState) -> bool {
    let probe = state.paths.temp_path(&ember_core::ids::new_request_id());
    let writable = std::fs::write(&probe, b"").is_ok();
    let _ = std::fs::remove_file(&probe);
    writable
}

async fn scheduler_fresh(state: &AppState) -> bool {
    match state.index.get_marker("health:scheduler_heartbeat").await {
        Ok(Some(raw)) => chrono::DateTime::parse_from_rfc3339(&raw)
            .map(|ts| (chrono::Utc::now() - ts.with_timezone(&chrono::Utc)).num_seconds() <= HEARTBEAT_FRESHNESS_SECONDS)
            .unwrap_or(false),
        _ => false,
    }
}
