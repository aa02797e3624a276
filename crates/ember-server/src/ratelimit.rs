//! Coarse per-(route, source-ip) request-volume guard, ahead of the
//! identifier-lookup throttle in `ember-index`. Where that throttle counts
//! *failed lookups*, this counts *requests*, matching the reference's use of
//! a blunt IP+route limiter (`slowapi`) in front of the Redis-backed abuse
//! throttle.

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Window {
    started_at: Instant,
    count: u32,
}

/// Fixed-window limiter: `limit` requests per `(route, ip)` per `period`.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<DashMap<(String, IpAddr), Window>>,
    limit: u32,
    period: Duration,
}

impl RateLimiter {
    #[must_use]
    pub fn new(limit: u32, period: Duration) -> Self {
        Self { windows: Arc::new(DashMap::new()), limit, period }
    }

    fn check(&self, route: &str, ip: IpAddr) -> bool {
        let mut entry = self
            .windows
            .entry((route.to_string(), ip))
            .or_insert_with(|| Window { started_at: Instant::now(), count: 0 });

        if entry.started_at.elapsed() > self.period {
            entry.started_at = Instant::now();
            entry.count = 0;
        }

        entry.count += 1;
        entry.count <= self.limit
    }
}

pub async fn enforce(
    axum::extract::State(limiter): axum::extract::State<RateLimiter>,
    axum::extract::ConnectInfo(addr): axum::extract::ConnectInfo<std::net::SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let route = request.uri().path().to_string();
    if limiter.check(&route, addr.ip()) {
        next.run(request).await
    } else {
        (StatusCode::TOO_MANY_REQUESTS, "request rate limit exceeded").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit_then_blocks() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        assert!(limiter.check("/download", ip));
        assert!(limiter.check("/download", ip));
        assert!(!limiter.check("/download", ip));
    }

    #[test]
    fn resets_after_period_elapses() {
        let limiter = RateLimiter::new(1, Duration::from_millis(10));
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        assert!(limiter.check("/download", ip));
        std::thread::sleep(Duration::from_millis(20));
        assert!(limiter.check("/download", ip));
    }

    #[test]
    fn separate_routes_have_independent_counters() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        assert!(limiter.check("/download", ip));
        assert!(limiter.check("/preview", ip));
    }
}
