//! Per-request correlation id: generated once at the edge, attached to the
//! response header, and recorded on the tracing span that wraps the rest of
//! request handling.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;

const HEADER_NAME: &str = "x-request-id";

pub async fn attach(request: Request, next: Next) -> Response {
    let request_id = ember_core::ids::new_request_id();
    let span = tracing::info_span!("request", request_id = %request_id, method = %request.method(), path = %request.uri().path());

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(HEADER_NAME, value);
    }
    response
}
