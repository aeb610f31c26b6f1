//! Axum router construction for the poll API.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use daypoll_db::KeyValueStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete router.
///
/// CORS allows any origin so a browser front end on another port can call
/// the API during development.
pub fn build_router<S: KeyValueStore>(state: Arc<AppState<S>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(handlers::health::<S>))
        // Live polls
        .route(
            "/api/polls",
            get(handlers::list_polls::<S>).post(handlers::create_poll::<S>),
        )
        .route(
            "/api/polls/{id}",
            get(handlers::get_poll::<S>).delete(handlers::delete_poll::<S>),
        )
        .route("/api/polls/{id}/votes", post(handlers::record_vote::<S>))
        .route("/api/polls/{id}/tally", get(handlers::get_tally::<S>))
        .route("/api/polls/{id}/archive", post(handlers::archive_poll::<S>))
        // Archive
        .route(
            "/api/archive",
            get(handlers::list_archived::<S>).post(handlers::create_archived::<S>),
        )
        .route("/api/archive/latest", get(handlers::latest_archived::<S>))
        .route(
            "/api/archive/{id}",
            get(handlers::get_archived::<S>).delete(handlers::delete_archived::<S>),
        )
        // WebSocket
        .route("/ws/events", get(ws::ws_events::<S>))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
