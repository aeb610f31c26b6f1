//! `Dragonfly` (Redis-compatible) implementation of [`KeyValueStore`].
//!
//! `Dragonfly` holds every live poll. Records are hashes, membership and
//! revealed-milestone tracking are sets, and the per-day poll index is a
//! set. Field increments map to `HINCRBY`, add-if-absent maps to `SADD`
//! (whose reply says whether the member was new), and batched increments
//! run inside `MULTI`/`EXEC`.
//!
//! # Commands
//!
//! | Operation | Command |
//! |-----------|---------|
//! | `get` / `set` | `GET` / `SET` |
//! | `set_fields` / `set_field` | `HSET` |
//! | `get_field` / `get_all_fields` | `HGET` / `HGETALL` |
//! | `increment_field` | `HINCRBY key field 1` |
//! | `increment_fields` | `MULTI`, `HINCRBY` x N, `EXEC` |
//! | `add_to_set` / `is_member` / `set_members` | `SADD` / `SISMEMBER` / `SMEMBERS` |
//! | `delete` / `expire` | `DEL` / `EXPIRE` |
//!
//! Every command is bounded by a deadline. A command that misses it fails
//! with [`StoreError::Timeout`]; nothing is retried here, since a retried
//! increment could count a vote twice.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use fred::prelude::*;

use crate::error::StoreError;
use crate::store::KeyValueStore;

/// Default per-command deadline.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Key probed by [`KeyValueStore::health_check`].
const HEALTH_KEY: &str = "daypoll:health";

/// Connection handle to a `Dragonfly` (Redis-compatible) instance.
///
/// Wraps a [`fred::prelude::Client`]. Cloning is cheap and every clone
/// shares the same connection.
#[derive(Clone)]
pub struct DragonflyStore {
    client: Client,
    timeout: Duration,
}

impl DragonflyStore {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the URL cannot be parsed.
    /// Returns [`StoreError::Unavailable`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let config = Config::from_url(url)
            .map_err(|e| StoreError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config)
            .build()
            .map_err(|e| StoreError::unavailable("connect", e))?;
        client
            .init()
            .await
            .map_err(|e| StoreError::unavailable("connect", e))?;

        tracing::info!("Connected to Dragonfly");
        Ok(Self {
            client,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        })
    }

    /// Set the per-command deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The per-command deadline.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Flush all keys from the `Dragonfly` instance.
    ///
    /// **WARNING:** This deletes all data. Only use for testing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the flush fails.
    pub async fn flush_all(&self) -> Result<(), StoreError> {
        self.run("flushall", self.client.flushall::<()>(false)).await
    }

    /// Await a command under the deadline and map its failure.
    async fn run<T, F>(&self, operation: &'static str, command: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, fred::error::Error>> + Send,
    {
        match tokio::time::timeout(self.timeout, command).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::debug!(operation, error = %e, "Dragonfly command failed");
                Err(StoreError::unavailable(operation, e))
            }
            Err(_elapsed) => {
                let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::debug!(operation, timeout_ms, "Dragonfly command timed out");
                Err(StoreError::Timeout {
                    operation,
                    timeout_ms,
                })
            }
        }
    }
}

impl KeyValueStore for DragonflyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.run("get", self.client.get::<Option<String>, _>(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.run("set", self.client.set::<(), _, _>(key, value, None, None, false))
            .await
    }

    async fn set_fields(&self, key: &str, fields: &[(&str, String)]) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }
        let values: HashMap<String, String> = fields
            .iter()
            .map(|(field, value)| ((*field).to_owned(), value.clone()))
            .collect();
        let _: i64 = self
            .run("hset", self.client.hset::<i64, _, _>(key, values))
            .await?;
        Ok(())
    }

    async fn set_field(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let _: i64 = self
            .run("hset", self.client.hset::<i64, _, _>(key, (field, value)))
            .await?;
        Ok(())
    }

    async fn get_field(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.run("hget", self.client.hget::<Option<String>, _, _>(key, field))
            .await
    }

    async fn get_all_fields(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.run(
            "hgetall",
            self.client.hgetall::<HashMap<String, String>, _>(key),
        )
        .await
    }

    async fn increment_field(&self, key: &str, field: &str) -> Result<i64, StoreError> {
        self.run("hincrby", self.client.hincrby::<i64, _, _>(key, field, 1))
            .await
    }

    async fn increment_fields(&self, key: &str, fields: &[&str]) -> Result<Vec<i64>, StoreError> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        let batch = async {
            let trx = self.client.multi();
            for field in fields {
                let _: () = trx.hincrby(key, *field, 1).await?;
            }
            trx.exec::<Vec<i64>>(true).await
        };
        self.run("multi/hincrby", batch).await
    }

    async fn add_to_set(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let added: i64 = self
            .run("sadd", self.client.sadd::<i64, _, _>(key, member))
            .await?;
        Ok(added > 0)
    }

    async fn is_member(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.run("sismember", self.client.sismember::<bool, _, _>(key, member))
            .await
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.run("smembers", self.client.smembers::<Vec<String>, _>(key))
            .await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _: i64 = self.run("del", self.client.del::<i64, _>(key)).await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX).max(1);
        let _: bool = self
            .run("expire", self.client.expire::<bool, _>(key, seconds, None))
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let _: i64 = self
            .run("exists", self.client.exists::<i64, _>(HEALTH_KEY))
            .await?;
        Ok(())
    }
}
