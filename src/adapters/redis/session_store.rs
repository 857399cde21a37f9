use crate::adapters::redis::RedisClient;
use crate::services::session_store::{SessionStore, StoreError};
use async_trait::async_trait;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;

/// Session records as plain Redis keys: `<prefix><session_id> -> user_id` with a
/// millisecond TTL. Redis expires keys itself and `DEL` is atomic per key.
#[derive(Debug, Clone)]
pub struct RedisSessionStore {
    redis: Arc<RedisClient>,
    prefix: String,
}

impl RedisSessionStore {
    #[must_use]
    pub const fn new(redis: Arc<RedisClient>, prefix: String) -> Self {
        Self { redis, prefix }
    }

    fn key(&self, session_id: &str) -> String {
        format!("{}{session_id}", self.prefix)
    }
}

fn store_error(err: &redis::RedisError) -> StoreError {
    if err.is_timeout() { StoreError::Timeout } else { StoreError::Unavailable(err.to_string()) }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    #[tracing::instrument(level = "debug", skip(self, session_id), err)]
    async fn put(&self, session_id: &str, user_id: i64, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.redis.connection();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let _: () = conn.pset_ex(self.key(session_id), user_id, ttl_ms).await.map_err(|e| store_error(&e))?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, session_id), err)]
    async fn get(&self, session_id: &str) -> Result<i64, StoreError> {
        let mut conn = self.redis.connection();
        let user_id: Option<i64> = conn.get(self.key(session_id)).await.map_err(|e| store_error(&e))?;
        user_id.ok_or(StoreError::NotFound)
    }

    #[tracing::instrument(level = "debug", skip(self, session_id), err)]
    async fn delete(&self, session_id: &str) -> Result<u64, StoreError> {
        let mut conn = self.redis.connection();
        let removed: u64 = conn.del(self.key(session_id)).await.map_err(|e| store_error(&e))?;
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.redis.ping().await.map_err(|e| store_error(&e))
    }
}
