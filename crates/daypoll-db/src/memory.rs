//! In-process implementation of [`KeyValueStore`].
//!
//! Used by tests and by single-node deployments that do not need a shared
//! `Dragonfly`. Every operation runs under one async mutex, so field
//! increments and set insertions are atomic exactly as the contract asks.
//! Expiry is lazy: an expired key is purged the next time it is touched.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::StoreError;
use crate::store::KeyValueStore;

/// A stored value.
#[derive(Debug, Clone)]
enum Value {
    Scalar(String),
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Entry>,
}

impl State {
    /// Look up a live entry, dropping it first if its TTL has passed.
    fn live(&mut self, key: &str) -> Option<&mut Entry> {
        let now = Instant::now();
        let expired = self
            .entries
            .get(key)
            .and_then(|e| e.expires_at)
            .is_some_and(|at| at <= now);
        if expired {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }

    fn hash_mut(
        &mut self,
        operation: &'static str,
        key: &str,
    ) -> Result<&mut HashMap<String, String>, StoreError> {
        if self.live(key).is_none() {
            self.entries.insert(
                key.to_owned(),
                Entry {
                    value: Value::Hash(HashMap::new()),
                    expires_at: None,
                },
            );
        }
        match self.entries.get_mut(key).map(|e| &mut e.value) {
            Some(Value::Hash(fields)) => Ok(fields),
            _ => Err(wrong_type(operation, key)),
        }
    }

    fn set_mut(
        &mut self,
        operation: &'static str,
        key: &str,
    ) -> Result<&mut HashSet<String>, StoreError> {
        if self.live(key).is_none() {
            self.entries.insert(
                key.to_owned(),
                Entry {
                    value: Value::Set(HashSet::new()),
                    expires_at: None,
                },
            );
        }
        match self.entries.get_mut(key).map(|e| &mut e.value) {
            Some(Value::Set(members)) => Ok(members),
            _ => Err(wrong_type(operation, key)),
        }
    }

    fn hash(
        &mut self,
        operation: &'static str,
        key: &str,
    ) -> Result<Option<&HashMap<String, String>>, StoreError> {
        match self.live(key).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::Hash(fields)) => Ok(Some(fields)),
            Some(_) => Err(wrong_type(operation, key)),
        }
    }

    fn set(
        &mut self,
        operation: &'static str,
        key: &str,
    ) -> Result<Option<&HashSet<String>>, StoreError> {
        match self.live(key).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::Set(members)) => Ok(Some(members)),
            Some(_) => Err(wrong_type(operation, key)),
        }
    }
}

fn wrong_type(operation: &'static str, key: &str) -> StoreError {
    StoreError::WrongType {
        operation,
        key: key.to_owned(),
    }
}

/// Increment a string-encoded integer field, creating it at zero.
fn bump(
    fields: &mut HashMap<String, String>,
    operation: &'static str,
    field: &str,
) -> Result<i64, StoreError> {
    let current = match fields.get(field) {
        None => 0,
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|e| StoreError::unavailable(operation, format!("{field} is not an integer: {e}")))?,
    };
    let next = current
        .checked_add(1)
        .ok_or_else(|| StoreError::unavailable(operation, format!("{field} would overflow")))?;
    fields.insert(field.to_owned(), next.to_string());
    Ok(next)
}

/// In-memory key-value store.
///
/// Cloning yields another handle to the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys (expired keys are excluded).
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let state = self.state.lock().await;
        state
            .entries
            .values()
            .filter(|e| e.expires_at.is_none_or(|at| at > now))
            .count()
    }

    /// Whether the store holds no live keys.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remaining lifetime of a key, if it exists and has a TTL.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let mut state = self.state.lock().await;
        let at = state.live(key)?.expires_at?;
        Some(at.saturating_duration_since(Instant::now()))
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut state = self.state.lock().await;
        match state.live(key).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::Scalar(v)) => Ok(Some(v.clone())),
            Some(_) => Err(wrong_type("get", key)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.entries.insert(
            key.to_owned(),
            Entry {
                value: Value::Scalar(value.to_owned()),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_fields(&self, key: &str, fields: &[(&str, String)]) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut state = self.state.lock().await;
        let hash = state.hash_mut("hset", key)?;
        for (field, value) in fields {
            hash.insert((*field).to_owned(), value.clone());
        }
        Ok(())
    }

    async fn set_field(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state
            .hash_mut("hset", key)?
            .insert(field.to_owned(), value.to_owned());
        Ok(())
    }

    async fn get_field(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state
            .hash("hget", key)?
            .and_then(|fields| fields.get(field).cloned()))
    }

    async fn get_all_fields(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state.hash("hgetall", key)?.cloned().unwrap_or_default())
    }

    async fn increment_field(&self, key: &str, field: &str) -> Result<i64, StoreError> {
        let mut state = self.state.lock().await;
        bump(state.hash_mut("hincrby", key)?, "hincrby", field)
    }

    async fn increment_fields(&self, key: &str, fields: &[&str]) -> Result<Vec<i64>, StoreError> {
        let mut state = self.state.lock().await;
        let hash = state.hash_mut("multi/hincrby", key)?;
        // Work on a copy so a failing field leaves the record untouched.
        let mut staged = hash.clone();
        let mut values = Vec::with_capacity(fields.len());
        for field in fields {
            values.push(bump(&mut staged, "multi/hincrby", field)?);
        }
        *hash = staged;
        Ok(values)
    }

    async fn add_to_set(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state.set_mut("sadd", key)?.insert(member.to_owned()))
    }

    async fn is_member(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state
            .set("sismember", key)?
            .is_some_and(|members| members.contains(member)))
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state
            .set("smembers", key)?
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.state.lock().await.entries.remove(key);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.live(key) {
            entry.expires_at = Instant::now().checked_add(ttl);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
