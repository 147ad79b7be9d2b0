//! Remote key-value backend powered by Redis.
//!
//! Uses a multiplexed [`ConnectionManager`] so many concurrent operations
//! share one underlying connection. The connection is established at
//! construction; readiness is verified by the `init` ping that the cache
//! factory issues for async-init backends.

use crate::cache::CacheBackend;
use crate::error::Error;
use crate::serialize::Payload;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::debug;

pub struct RedisBackend {
    manager: ConnectionManager,
    url: String,
}

impl RedisBackend {
    /// Opens a connection manager against `url`.
    ///
    /// # Errors
    ///
    /// Returns a cache error if the URL is invalid or the initial
    /// connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let client = redis::Client::open(url)
            .map_err(|e| Error::cache_failed(format!("invalid redis url: {e}")))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::cache_failed(format!("redis connection failed: {e}")))?;
        Ok(Self {
            manager,
            url: url.to_string(),
        })
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

fn redis_err(op: &str, e: &redis::RedisError) -> Error {
    Error::cache_failed(format!("redis {op} failed: {e}"))
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Payload>, Error> {
        let mut conn = self.conn();
        let data: Option<Vec<u8>> = conn.get(key).await.map_err(|e| redis_err("get", &e))?;
        Ok(data.map(Payload::Bytes))
    }

    async fn set(&self, key: &str, value: Payload, ttl: Option<Duration>) -> Result<(), Error> {
        let Payload::Bytes(bytes) = value else {
            return Err(Error::cache_failed(
                "redis backend requires encoded byte payloads",
            ));
        };

        let mut conn = self.conn();
        match ttl {
            Some(ttl) if ttl.as_secs() > 0 => {
                let _: () = conn
                    .set_ex(key, bytes, ttl.as_secs())
                    .await
                    .map_err(|e| redis_err("setex", &e))?;
            }
            _ => {
                let _: () = conn.set(key, bytes).await.map_err(|e| redis_err("set", &e))?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        let mut conn = self.conn();
        let deleted: u64 = conn.del(key).await.map_err(|e| redis_err("del", &e))?;
        debug!(key, deleted, "redis delete");
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, Error> {
        let mut conn = self.conn();
        conn.exists(key).await.map_err(|e| redis_err("exists", &e))
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let mut conn = self.conn();
        conn.keys("*").await.map_err(|e| redis_err("keys", &e))
    }

    async fn clear(&self) -> Result<(), Error> {
        let mut conn = self.conn();
        redis::cmd("FLUSHDB")
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| redis_err("flushdb", &e))
    }

    async fn init(&self) -> Result<(), Error> {
        let mut conn = self.conn();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_err("ping", &e))?;
        if pong != "PONG" {
            return Err(Error::cache_failed(format!(
                "redis is not available at {}",
                self.url
            )));
        }
        Ok(())
    }

    fn backend_id(&self) -> &'static str {
        "redis"
    }
}
