//! Data layer for Daypoll (`Dragonfly` + `PostgreSQL`).
//!
//! Live polls are hot, short-lived state: one record per poll, a membership
//! set per poll, a revealed-milestone set per poll, and a per-day poll
//! index. They live in a Redis-compatible store behind [`KeyValueStore`].
//! Archived questions are cold, permanent rows in `PostgreSQL`.
//!
//! ```text
//! Poll API
//!     |
//!     +-- Live polls, votes, tallies --> KeyValueStore
//!     |                                   |-- DragonflyStore (fred)
//!     |                                   +-- MemoryStore    (tests, single node)
//!     |
//!     +-- Question archive ----------> ArchiveBackend
//!                                         |-- PostgresArchive (sqlx)
//!                                         +-- MemoryArchive
//! ```
//!
//! # Modules
//!
//! - [`store`] -- the key-value contract
//! - [`dragonfly`] -- `Dragonfly` implementation of the contract
//! - [`memory`] -- in-process implementation of the contract
//! - [`postgres`] -- `PostgreSQL` connection pool and migrations
//! - [`archive_store`] -- archived question persistence
//! - [`error`] -- shared error types

pub mod archive_store;
pub mod dragonfly;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use archive_store::{ArchiveBackend, MemoryArchive, PostgresArchive};
pub use dragonfly::DragonflyStore;
pub use error::{ArchiveError, StoreError};
pub use memory::MemoryStore;
pub use postgres::{PostgresConfig, PostgresPool};
pub use store::KeyValueStore;
