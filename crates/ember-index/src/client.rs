//! The Redis-backed index: atomic use-count decrement and preview-once flip.

use crate::record::{NewUpload, UploadRecord};
use deadpool_redis::{Config, PoolConfig, Runtime};
use redis::AsyncCommands;
use std::collections::HashMap;
use thiserror::Error;

/// Errors surfaced by index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("redis_url must start with 'redis://', got: {0}")]
    InvalidUrl(String),
    #[error("failed to build redis connection pool: {0}")]
    Pool(#[from] deadpool_redis::CreatePoolError),
    #[error("redis connection pool exhausted or closed: {0}")]
    PoolGet(#[from] deadpool_redis::PoolError),
    #[error("redis command error: {0}")]
    Redis(#[from] redis::RedisError),
}

const DECREMENT_USES_SCRIPT: &str = r"
local uses = redis.call('GET', KEYS[1])
if not uses then return -2 end
uses = tonumber(uses)
if uses > 0 then
    return redis.call('DECR', KEYS[1])
else
    return -1
end
";

// Collapses the reference implementation's separate EXISTS-then-GETSET into
// a single script so two concurrent previewers cannot both observe the
// unset state and both flip it.
const MARK_PREVIEWED_SCRIPT: &str = r"
local v = redis.call('GET', KEYS[1])
if v == false then return 0 end
if v == '1' then return 0 end
redis.call('SET', KEYS[1], '1', 'KEEPTTL')
return 1
";

/// A pooled connection to the Redis-backed index.
#[derive(Clone)]
pub struct IndexClient {
    pool: deadpool_redis::Pool,
}

impl IndexClient {
    /// Connect with a bounded pool of `max_connections`, verifying
    /// reachability with a ping before returning. `url` must start with
    /// `redis://`.
    pub async fn connect(url: &str, max_connections: usize) -> Result<Self, IndexError> {
        if !url.starts_with("redis://") {
            return Err(IndexError::InvalidUrl(url.to_string()));
        }

        let mut cfg = Config::from_url(url);
        cfg.pool = Some(PoolConfig::new(max_connections));
        let pool = cfg.create_pool(Some(Runtime::Tokio1))?;

        let client = Self { pool };
        client.ping().await?;
        Ok(client)
    }

    /// Clone of the underlying pool handle, shared with [`crate::Throttle`]
    /// so both sit on the same bounded connection pool.
    #[must_use]
    pub fn pool(&self) -> deadpool_redis::Pool {
        self.pool.clone()
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, IndexError> {
        Ok(self.pool.get().await?)
    }

    /// Verify the store is reachable.
    pub async fn ping(&self) -> Result<(), IndexError> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// Write the metadata field-map and the two counter subkeys, all with
    /// the same TTL, in one pipelined transaction.
    pub async fn save(
        &self,
        id: &str,
        upload: &NewUpload,
        uses: i64,
        ttl_seconds: u64,
    ) -> Result<(), IndexError> {
        let mut conn = self.conn().await?;
        let primary = format!("upload:{id}");
        let uses_key = format!("upload:{id}:uses");
        let previewed_key = format!("upload:{id}:previewed");

        let fields: [(&str, &str); 6] = [
            ("filename", &upload.filename),
            ("mime_type", &upload.mime_type),
            ("sha256", &upload.sha256),
            ("created_at", &upload.created_at),
            ("expiry_at", &upload.expiry_at),
            ("encryption_key", &upload.encryption_key),
        ];
        let size_str = upload.size.to_string();

        let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);

        redis::pipe()
            .atomic()
            .hset_multiple(&primary, &fields)
            .ignore()
            .hset(&primary, "size", &size_str)
            .ignore()
            .set(&uses_key, uses)
            .ignore()
            .set(&previewed_key, "0")
            .ignore()
            .expire(&primary, ttl)
            .ignore()
            .expire(&uses_key, ttl)
            .ignore()
            .expire(&previewed_key, ttl)
            .ignore()
            .query_async(&mut conn)
            .await?;

        tracing::info!(key = id, "metadata_saved");
        Ok(())
    }

    /// Read the full record for `id`, or `None` if the primary subkey is absent.
    pub async fn get(&self, id: &str) -> Result<Option<UploadRecord>, IndexError> {
        let mut conn = self.conn().await?;
        let primary = format!("upload:{id}");
        let uses_key = format!("upload:{id}:uses");
        let previewed_key = format!("upload:{id}:previewed");

        let (fields, uses, previewed): (HashMap<String, String>, Option<String>, Option<String>) =
            redis::pipe().hgetall(&primary).get(&uses_key).get(&previewed_key).query_async(&mut conn).await?;

        Ok(UploadRecord::from_fields(fields, uses, previewed))
    }

    /// Atomically decrement the use counter. Returns `-2` if absent, `-1` if
    /// already exhausted, otherwise the post-decrement remaining count.
    pub async fn decrement_uses(&self, id: &str) -> Result<i64, IndexError> {
        let mut conn = self.conn().await?;
        let key = format!("upload:{id}:uses");
        let result: i64 =
            redis::Script::new(DECREMENT_USES_SCRIPT).key(key).invoke_async(&mut conn).await?;
        Ok(result)
    }

    /// Atomically flip the preview flag. Returns `true` only for the call
    /// that performed the flip.
    pub async fn mark_previewed_once(&self, id: &str) -> Result<bool, IndexError> {
        let mut conn = self.conn().await?;
        let key = format!("upload:{id}:previewed");
        let result: i64 =
            redis::Script::new(MARK_PREVIEWED_SCRIPT).key(key).invoke_async(&mut conn).await?;
        Ok(result == 1)
    }

    /// Remaining TTL in seconds on the primary subkey; `-1` if absent.
    pub async fn get_ttl(&self, id: &str) -> Result<i64, IndexError> {
        let mut conn = self.conn().await?;
        let primary = format!("upload:{id}");
        let ttl: i64 = conn.ttl(&primary).await?;
        Ok(if ttl > 0 { ttl } else { -1 })
    }

    /// Whether the primary subkey is present.
    pub async fn exists(&self, id: &str) -> Result<bool, IndexError> {
        let mut conn = self.conn().await?;
        let primary = format!("upload:{id}");
        let exists: bool = conn.exists(&primary).await?;
        Ok(exists)
    }

    /// Remove all three subkeys. Idempotent.
    pub async fn delete(&self, id: &str) -> Result<bool, IndexError> {
        let mut conn = self.conn().await?;
        let keys = [format!("upload:{id}"), format!("upload:{id}:uses"), format!("upload:{id}:previewed")];
        let deleted: i64 = conn.del(&keys).await?;
        Ok(deleted > 0)
    }

    /// Set a liveness marker key (e.g. `health:scheduler_heartbeat`).
    pub async fn set_marker(&self, key: &str, value: &str) -> Result<(), IndexError> {
        let mut conn = self.conn().await?;
        let () = conn.set(key, value).await?;
        Ok(())
    }

    /// Read a liveness marker key.
    pub async fn get_marker(&self, key: &str) -> Result<Option<String>, IndexError> {
        let mut conn = self.conn().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }
}

impl ember_words::KeyExistenceCheck for IndexClient {
    type Error = IndexError;

    async fn exists(&self, key: &str) -> Result<bool, IndexError> {
        self.exists(key).await
    }
}

// These exercise the one place in the workspace where concurrent callers
// race against the same Redis keys (`decrement_uses`, `mark_previewed_once`).
// They need a live Redis and are ignored by default; point
// `EMBER_TEST_REDIS_URL` at one to run them.
#[cfg(test)]
mod tests {
    use super::*;

    async fn test_client() -> Option<IndexClient> {
        let url = std::env::var("EMBER_TEST_REDIS_URL").ok()?;
        IndexClient::connect(&url, 4).await.ok()
    }

    fn sample_upload(expiry_at: &str) -> NewUpload {
        NewUpload {
            filename: "concurrency-test.bin".into(),
            size: 5,
            mime_type: "application/octet-stream".into(),
            sha256: "0".repeat(64),
            created_at: expiry_at.into(),
            expiry_at: expiry_at.into(),
            encryption_key: "unused".into(),
        }
    }

    #[tokio::test]
    #[ignore]
    async fn decrement_uses_two_racers_exactly_one_wins() {
        let Some(client) = test_client().await else {
            eprintln!("skipped; set EMBER_TEST_REDIS_URL to run");
            return;
        };
        let id = "test-decrement-race";
        client.delete(id).await.unwrap();
        client.save(id, &sample_upload("2999-01-01T00:00:00Z"), 1, 60).await.unwrap();

        let a = client.clone();
        let b = client.clone();
        let (r1, r2) =
            tokio::join!(tokio::spawn(async move { a.decrement_uses(id).await }), tokio::spawn(async move {
                b.decrement_uses(id).await
            }));
        let results = [r1.unwrap().unwrap(), r2.unwrap().unwrap()];

        assert!(results.contains(&0), "exactly one racer should observe the successful decrement to 0");
        assert!(results.contains(&-1), "the other racer should observe exhaustion, not a second decrement");

        client.delete(id).await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn mark_previewed_once_exactly_one_flip() {
        let Some(client) = test_client().await else {
            eprintln!("skipped; set EMBER_TEST_REDIS_URL to run");
            return;
        };
        let id = "test-preview-race";
        client.delete(id).await.unwrap();
        client.save(id, &sample_upload("2999-01-01T00:00:00Z"), 5, 60).await.unwrap();

        let a = client.clone();
        let b = client.clone();
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { a.mark_previewed_once(id).await }),
            tokio::spawn(async move { b.mark_previewed_once(id).await })
        );
        let flips = [r1.unwrap().unwrap(), r2.unwrap().unwrap()];

        assert_eq!(flips.iter().filter(|&&flipped| flipped).count(), 1, "exactly one caller should perform the flip");

        client.delete(id).await.unwrap();
    }
}
