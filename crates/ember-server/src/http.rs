//! Route table and middleware stack. Thin: every handler delegates
//! straight into C10-C14; this module only owns wiring.

use crate::ratelimit::RateLimiter;
use crate::state::AppState;
use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RATE_LIMIT_PER_MINUTE: u32 = 120;

pub fn build(state: AppState) -> Router {
    let limiter = RateLimiter::new(RATE_LIMIT_PER_MINUTE, Duration::from_secs(60));

    Router::new()
        .route("/upload/", axum::routing::post(crate::handlers::upload::upload))
        .route("/preview/:key", get(crate::handlers::preview::preview))
        .route("/download/:key", get(crate::handlers::download::download))
        .route("/status/:key", get(crate::handlers::status::status))
        .route("/health/", get(crate::handlers::health::health))
        .layer(middleware::from_fn_with_state(limiter, crate::ratelimit::enforce))
        .layer(SetResponseHeaderLayer::if_not_present(
            axum::http::header::HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            axum::http::header::HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(crate::request_id::attach))
        .with_state(state)
}
