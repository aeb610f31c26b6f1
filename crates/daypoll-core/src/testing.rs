//! Test doubles shared by the registry and counter tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use daypoll_db::{KeyValueStore, MemoryStore, StoreError};
use daypoll_types::PollEvent;

use crate::notifier::Notifier;

/// A [`MemoryStore`] that fails chosen operations, optionally only on keys
/// with a given prefix. It can also delete a key right after a set add,
/// standing in for a concurrent request.
#[derive(Clone, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    failing: Arc<Mutex<HashSet<(&'static str, String)>>>,
    deletes_after_add: Arc<Mutex<Vec<(String, String)>>>,
}

impl FailingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            failing: Arc::default(),
            deletes_after_add: Arc::default(),
        }
    }

    /// Delete `victim` after every successful add to a set whose key starts
    /// with `set_prefix`.
    pub fn delete_after_add(&self, set_prefix: &str, victim: &str) {
        if let Ok(mut deletes) = self.deletes_after_add.lock() {
            deletes.push((set_prefix.to_owned(), victim.to_owned()));
        }
    }

    /// Make `operation` fail on every key starting with `prefix`.
    pub fn fail(&self, operation: &'static str, prefix: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert((operation, prefix.to_owned()));
        }
    }

    pub fn heal(&self) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.clear();
        }
    }

    fn check(&self, operation: &'static str, key: &str) -> Result<(), StoreError> {
        let failing = self
            .failing
            .lock()
            .map_err(|e| StoreError::unavailable(operation, e))?;
        if failing
            .iter()
            .any(|(op, prefix)| *op == operation && key.starts_with(prefix.as_str()))
        {
            return Err(StoreError::unavailable(operation, "injected failure"));
        }
        Ok(())
    }
}

impl KeyValueStore for FailingStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check("get", key)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check("set", key)?;
        self.inner.set(key, value).await
    }

    async fn set_fields(&self, key: &str, fields: &[(&str, String)]) -> Result<(), StoreError> {
        self.check("set_fields", key)?;
        self.inner.set_fields(key, fields).await
    }

    async fn set_field(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.check("set_field", key)?;
        self.inner.set_field(key, field, value).await
    }

    async fn get_field(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.check("get_field", key)?;
        self.inner.get_field(key, field).await
    }

    async fn get_all_fields(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.check("get_all_fields", key)?;
        self.inner.get_all_fields(key).await
    }

    async fn increment_field(&self, key: &str, field: &str) -> Result<i64, StoreError> {
        self.check("increment_field", key)?;
        self.inner.increment_field(key, field).await
    }

    async fn increment_fields(&self, key: &str, fields: &[&str]) -> Result<Vec<i64>, StoreError> {
        self.check("increment_fields", key)?;
        self.inner.increment_fields(key, fields).await
    }

    async fn add_to_set(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.check("add_to_set", key)?;
        let added = self.inner.add_to_set(key, member).await?;
        let victims: Vec<String> = self
            .deletes_after_add
            .lock()
            .map(|deletes| {
                deletes
                    .iter()
                    .filter(|(prefix, _)| key.starts_with(prefix.as_str()))
                    .map(|(_, victim)| victim.clone())
                    .collect()
            })
            .unwrap_or_default();
        for victim in victims {
            self.inner.delete(&victim).await?;
        }
        Ok(added)
    }

    async fn is_member(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.check("is_member", key)?;
        self.inner.is_member(key, member).await
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.check("set_members", key)?;
        self.inner.set_members(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check("delete", key)?;
        self.inner.delete(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        self.check("expire", key)?;
        self.inner.expire(key, ttl).await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.check("health_check", "")?;
        self.inner.health_check().await
    }
}

/// Keeps every event it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<PollEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<PollEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.events().iter().filter(|e| e.kind() == kind).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: &PollEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
