//! HTTP and `WebSocket` API for Daypoll.
//!
//! Exposes the poll operations over REST, streams poll events over a
//! `WebSocket`, and serves the question archive. Writes require a bearer
//! token resolved by an [`AccountDirectory`](auth::AccountDirectory).
//!
//! The router is generic over the [`KeyValueStore`](daypoll_db::KeyValueStore)
//! backing the live polls, so tests drive it over the in-memory store.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use auth::{AccountDirectory, AuthError, Authenticated, JwtDirectory, StaticDirectory};
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::AppState;
