//! Maps the error taxonomy onto HTTP status codes and JSON bodies
//! through a single [`axum::response::IntoResponse`] implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ember_core::ErrorClass;
use serde::Serialize;
use serde_json::json;

/// The top-level error enum every handler returns.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request, size/type reject, format-invalid identifier.
    ClientError(String),
    /// Identifier absent or expired.
    NotFound(String),
    /// Download limit already reached.
    Gone(String),
    /// Source is currently blocked by the abuse throttle.
    Throttled { retry_after_seconds: i64 },
    /// Post-decrypt hash mismatch.
    Integrity { expected: String, actual: String },
    /// KV or disk I/O failure.
    Transient(String),
}

impl ApiError {
    /// The coarse classification this error belongs to, shared with every
    /// other component in the workspace via [`ember_core::ErrorClass`].
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::ClientError(_) => ErrorClass::ClientError,
            Self::NotFound(_) | Self::Gone(_) => ErrorClass::NotFound,
            Self::Throttled { .. } => ErrorClass::Throttled,
            Self::Integrity { .. } => ErrorClass::Integrity,
            Self::Transient(_) => ErrorClass::Transient,
        }
    }
}

#[derive(Serialize)]
struct SimpleError {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let class = self.class();
        match self {
            Self::ClientError(detail) => {
                (StatusCode::BAD_REQUEST, Json(SimpleError { detail })).into_response()
            }
            Self::NotFound(detail) => {
                (StatusCode::NOT_FOUND, Json(SimpleError { detail })).into_response()
            }
            Self::Gone(detail) => (StatusCode::GONE, Json(SimpleError { detail })).into_response(),
            Self::Throttled { retry_after_seconds } => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "detail": "too many requests", "retry_after_seconds": retry_after_seconds })),
            )
                .into_response(),
            Self::Integrity { expected, actual } => {
                tracing::error!(%expected, %actual, ?class, "integrity_check_failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "detail": {
                            "code": "INTEGRITY_CHECK_FAILED",
                            "expected": expected,
                            "actual": actual,
                        }
                    })),
                )
                    .into_response()
            }
            Self::Transient(detail) => {
                tracing::error!(detail, ?class, "transient_failure");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(SimpleError { detail: "internal error".into() }))
                    .into_response()
            }
        }
    }
}

impl From<ember_index::IndexError> for ApiError {
    fn from(err: ember_index::IndexError) -> Self {
        Self::Transient(err.to_string())
    }
}

impl From<ember_blob::RepoError> for ApiError {
    fn from(err: ember_blob::RepoError) -> Self {
        Self::Transient(err.to_string())
    }
}
