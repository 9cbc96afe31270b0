use std::time::Duration;

use async_trait::async_trait;
use quagmire_common::{QuagmireError, QuagmireResult, RedisEndpoint};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use tracing::{info, warn};

use crate::store::{ttl_secs, KeyWrite, SessionStore, WriteBatch};

fn store_error(err: redis::RedisError) -> QuagmireError {
    QuagmireError::StoreUnavailable(err.to_string())
}

fn connection_info(endpoint: &RedisEndpoint) -> ConnectionInfo {
    ConnectionInfo {
        addr: ConnectionAddr::Tcp(endpoint.host.clone(), endpoint.port),
        redis: RedisConnectionInfo {
            db: endpoint.db,
            password: endpoint.password.clone(),
            ..RedisConnectionInfo::default()
        },
    }
}

/// Redis-backed session store.
///
/// Holds a [`ConnectionManager`], which multiplexes commands over one
/// connection and reconnects on its own after a failure. Cloning the
/// manager per call is cheap.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Open a managed connection to `endpoint`.
    pub async fn connect(endpoint: &RedisEndpoint) -> QuagmireResult<Self> {
        let client = redis::Client::open(connection_info(endpoint)).map_err(store_error)?;
        let conn = ConnectionManager::new(client).await.map_err(store_error)?;
        let store = Self { conn };
        store.ping().await?;
        Ok(store)
    }

    /// Connect, retrying while the server is not reachable yet.
    ///
    /// Containers often start before the Redis they depend on; up to
    /// `retries` attempts are made, `delay` apart.
    pub async fn connect_with_retry(
        endpoint: &RedisEndpoint,
        retries: u32,
        delay: Duration,
    ) -> QuagmireResult<Self> {
        let attempts = retries.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match Self::connect(endpoint).await {
                Ok(store) => {
                    info!(attempt, redis = %endpoint, "connected to redis");
                    return Ok(store);
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = attempts,
                        redis = %endpoint,
                        error = %e,
                        "redis connection attempt failed"
                    );
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            QuagmireError::StoreUnavailable("no connection attempt was made".to_string())
        }))
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn ping(&self) -> QuagmireResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await.map_err(store_error)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> QuagmireResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await.map_err(store_error)?;
        Ok(value)
    }

    async fn exists(&self, key: &str) -> QuagmireResult<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(key).await.map_err(store_error)?;
        Ok(exists)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> QuagmireResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl_secs(ttl)).await.map_err(store_error)?;
        Ok(())
    }

    async fn write_batch(&self, batch: &WriteBatch) -> QuagmireResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for write in batch.writes() {
            match write {
                KeyWrite::Set { key, value, ttl } => {
                    pipe.set_ex(key, value, ttl_secs(*ttl)).ignore();
                }
                KeyWrite::Expire { key, ttl } => {
                    pipe.expire(key, ttl_secs(*ttl) as i64).ignore();
                }
            }
        }

        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await.map_err(store_error)?;
        Ok(())
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> QuagmireResult<(u64, Vec<String>)> {
        let mut conn = self.conn.clone();
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok((next, keys))
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
