//! Per-(scope, source-ip) abuse throttle, sharing the index's connection pool.

use crate::client::IndexError;
use redis::AsyncCommands;

/// Endpoints that each carry an independent failure counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Download,
    Preview,
    Status,
}

impl Scope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Preview => "preview",
            Self::Status => "status",
        }
    }
}

/// Outcome of a pre-request throttle check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    Allowed,
    Blocked { retry_after_seconds: i64 },
}

/// Failure-counting and blocking over the same Redis pool the index uses.
#[derive(Clone)]
pub struct Throttle {
    pool: deadpool_redis::Pool,
    failure_counter_ttl_seconds: i64,
}

impl Throttle {
    /// `failure_counter_ttl_seconds` is the sliding window a failure counter
    /// survives for; callers pass the operator-configured value (fixed at
    /// 600 by default, see `ember_server::config::Settings`).
    #[must_use]
    pub fn new(pool: deadpool_redis::Pool, failure_counter_ttl_seconds: i64) -> Self {
        Self { pool, failure_counter_ttl_seconds }
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, IndexError> {
        Ok(self.pool.get().await?)
    }

    /// Check whether `(scope, source_ip)` is currently blocked.
    pub async fn check(&self, scope: Scope, source_ip: &str) -> Result<ThrottleDecision, IndexError> {
        let mut conn = self.conn().await?;
        let block_key = format!("block:{}:{source_ip}", scope.as_str());

        let exists: bool = conn.exists(&block_key).await?;
        if !exists {
            return Ok(ThrottleDecision::Allowed);
        }

        let ttl: i64 = conn.ttl(&block_key).await?;
        Ok(ThrottleDecision::Blocked { retry_after_seconds: ttl.max(0) })
    }

    /// Record a failed lookup. Blocks the source once `threshold` failures
    /// accumulate within the sliding window.
    pub async fn register_miss(
        &self,
        scope: Scope,
        source_ip: &str,
        threshold: i64,
        block_window_seconds: i64,
    ) -> Result<(), IndexError> {
        let mut conn = self.conn().await?;
        let fail_key = format!("fails:{}:{source_ip}", scope.as_str());
        let block_key = format!("block:{}:{source_ip}", scope.as_str());

        let fails: i64 = conn.incr(&fail_key, 1).await?;
        let () = conn.expire(&fail_key, self.failure_counter_ttl_seconds).await?;

        if fails >= threshold {
            let window = u64::try_from(block_window_seconds).unwrap_or(0);
            let () = conn.set_ex(&block_key, "1", window).await?;
            tracing::error!(scope = scope.as_str(), ip = source_ip, fails, "brute_force_block");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_names_match_key_conventions() {
        assert_eq!(Scope::Download.as_str(), "download");
        assert_eq!(Scope::Preview.as_str(), "preview");
        assert_eq!(Scope::Status.as_str(), "status");
    }
}
