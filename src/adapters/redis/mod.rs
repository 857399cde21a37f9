use crate::config::SessionConfig;
use backon::{ExponentialBuilder, Retryable};
use std::sync::Arc;
use std::time::Duration;

pub mod session_store;

pub use session_store::RedisSessionStore;

#[derive(Clone)]
pub struct RedisClient {
    connection: redis::aio::ConnectionManager,
}

impl std::fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClient").finish_non_exhaustive()
    }
}

impl RedisClient {
    /// Connects to Redis, retrying with exponential backoff.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or every connection attempt fails.
    pub async fn new(config: &SessionConfig) -> anyhow::Result<Arc<Self>> {
        let client = redis::Client::open(config.redis_url.as_str())?;

        let retry_strategy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(5))
            .with_max_times(config.connect_retries);

        let connection = (|| async { client.get_connection_manager().await })
            .retry(retry_strategy)
            .notify(|e, duration| {
                tracing::warn!(error = %e, "Redis connection failed, retrying in {:?}", duration);
            })
            .await?;

        tracing::info!("Connected to Redis");
        Ok(Arc::new(Self { connection }))
    }

    /// Returns a multiplexed connection handle. Cloning is cheap.
    #[must_use]
    pub fn connection(&self) -> redis::aio::ConnectionManager {
        self.connection.clone()
    }

    /// Pings the Redis server to check connectivity.
    ///
    /// # Errors
    /// Returns an error if the ping fails.
    pub async fn ping(&self) -> redis::RedisResult<()> {
        let mut conn = self.connection();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}
