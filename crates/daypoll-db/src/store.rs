//! The key-value store contract shared by every live-poll component.
//!
//! Components receive a store handle at construction and never reach for a
//! global client. The contract is small: scalar get/set, hash records with
//! atomic field increments, sets with atomic add-if-absent, deletion, and
//! expiry. All field-level atomicity is the store's job; callers do not lock.
//!
//! Methods return `impl Future + Send` so generic callers (HTTP handlers,
//! spawned tasks) can hold the futures across `.await` points on a
//! multi-threaded runtime.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use crate::error::StoreError;

/// Backing store for poll records, membership sets, and day indexes.
///
/// Reads of missing keys are not errors: [`get`](Self::get) and
/// [`get_field`](Self::get_field) yield `None`, [`get_all_fields`](Self::get_all_fields)
/// yields an empty map, and [`set_members`](Self::set_members) an empty list.
pub trait KeyValueStore: Clone + Send + Sync + 'static {
    /// Read a scalar value.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Write a scalar value, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Write several fields of a record in one command.
    fn set_fields(
        &self,
        key: &str,
        fields: &[(&str, String)],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Write a single field of a record.
    fn set_field(
        &self,
        key: &str,
        field: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Read a single field of a record.
    fn get_field(
        &self,
        key: &str,
        field: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Read every field of a record.
    fn get_all_fields(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<HashMap<String, String>, StoreError>> + Send;

    /// Atomically add one to a field, creating it at zero first if absent.
    ///
    /// Returns the new value.
    fn increment_field(
        &self,
        key: &str,
        field: &str,
    ) -> impl Future<Output = Result<i64, StoreError>> + Send;

    /// Atomically add one to each of `fields` as a single batch.
    ///
    /// Either every increment is applied or none is. Returns the new values
    /// in the order of `fields`.
    fn increment_fields(
        &self,
        key: &str,
        fields: &[&str],
    ) -> impl Future<Output = Result<Vec<i64>, StoreError>> + Send;

    /// Add `member` to a set.
    ///
    /// Returns `true` if the member was newly added and `false` if it was
    /// already present. Concurrent callers adding the same member see
    /// exactly one `true`.
    fn add_to_set(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Whether `member` is in the set.
    fn is_member(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Every member of a set, in no particular order.
    fn set_members(&self, key: &str)
    -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Delete a key of any type. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Bound the lifetime of a key. The store may reclaim it afterwards.
    fn expire(&self, key: &str, ttl: Duration)
    -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Cheap round trip proving the store is reachable.
    fn health_check(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
