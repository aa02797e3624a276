//! Shared primitives used across the ember workspace: request ids, timestamps,
//! uptime tracking, and the error taxonomy that the HTTP layer maps onto status codes.

#![deny(unsafe_code)]

pub mod ids {
    //! Request-correlation id generation and timestamp helpers.

    use chrono::{DateTime, SecondsFormat, Utc};
    use uuid::Uuid;

    /// Opaque per-request correlation id, attached to every log line emitted
    /// while handling a single HTTP request.
    pub fn new_request_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Current instant, UTC.
    pub fn now() -> DateTime<Utc> {
        Utc::now()
    }

    /// Current instant as an RFC 3339 string with millisecond precision.
    pub fn now_rfc3339() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

pub mod uptime {
    //! Process uptime tracking, constructed once at startup and threaded
    //! through shared application state rather than held as a global.

    use chrono::{DateTime, Utc};
    use std::time::Instant;

    /// Tracks when the process started so the health endpoint can report
    /// uptime without relying on a module-level singleton.
    #[derive(Debug, Clone)]
    pub struct UptimeTracker {
        started_at: DateTime<Utc>,
        start_instant: Instant,
    }

    impl UptimeTracker {
        /// Start the clock. Call exactly once, at process startup.
        #[must_use]
        pub fn start() -> Self {
            Self { started_at: Utc::now(), start_instant: Instant::now() }
        }

        /// Wall-clock instant the process started.
        #[must_use]
        pub const fn started_at(&self) -> DateTime<Utc> {
            self.started_at
        }

        /// Whole seconds elapsed since the process started.
        #[must_use]
        pub fn uptime_seconds(&self) -> u64 {
            self.start_instant.elapsed().as_secs()
        }
    }
}

/// Coarse error classification shared by every component, mirroring the
/// taxonomy the HTTP layer maps onto status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorClass {
    /// Malformed request, size/type reject, format-invalid identifier.
    #[error("client error")]
    ClientError,
    /// Identifier absent, expired, or already exhausted.
    #[error("not found")]
    NotFound,
    /// Source is currently blocked by the abuse throttle.
    #[error("throttled")]
    Throttled,
    /// Post-decrypt integrity check failed.
    #[error("integrity failure")]
    Integrity,
    /// KV or disk I/O failure; retryable in principle.
    #[error("transient failure")]
    Transient,
    /// Unrecoverable startup failure; the process must not continue.
    #[error("fatal")]
    Fatal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_unique() {
        let a = ids::new_request_id();
        let b = ids::new_request_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn uptime_is_monotonic() {
        let tracker = uptime::UptimeTracker::start();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(tracker.uptime_seconds() < 2);
    }
}
