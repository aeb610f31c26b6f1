//! REST endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Auth | Description |
//! |--------|------|------|-------------|
//! | `GET` | `/api/health` | | Store reachability |
//! | `POST` | `/api/polls` | yes | Create a poll for today |
//! | `GET` | `/api/polls` | | List today's polls |
//! | `GET` | `/api/polls/{id}` | | Get one of today's polls |
//! | `DELETE` | `/api/polls/{id}` | yes | Delete one of today's polls |
//! | `POST` | `/api/polls/{id}/votes` | yes | Record a vote |
//! | `GET` | `/api/polls/{id}/tally` | | Current tally |
//! | `POST` | `/api/polls/{id}/archive` | yes | Snapshot a poll into the archive |
//! | `GET` | `/api/archive` | | List archived questions |
//! | `POST` | `/api/archive` | yes | Archive a question directly |
//! | `GET` | `/api/archive/latest` | | Most recently archived question |
//! | `GET` | `/api/archive/{id}` | | Get an archived question |
//! | `DELETE` | `/api/archive/{id}` | yes | Delete an archived question |

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use daypoll_db::KeyValueStore;
use daypoll_types::{
    ArchivedQuestion, Choice, NewArchivedQuestion, NewPoll, Poll, PollId, Tally, VoteResult,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Authenticated;
use crate::error::ApiError;
use crate::state::AppState;

/// Body of `POST /api/polls/{id}/votes`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct VoteRequest {
    /// `true` for the first choice, `false` for the second.
    pub is_first_choice: bool,
}

/// Body of `GET /api/polls/{id}/tally`.
#[derive(Debug, Clone, Serialize)]
pub struct TallyResponse {
    /// The poll.
    pub poll_id: PollId,
    /// Its counts.
    #[serde(flatten)]
    pub tally: Tally,
}

fn parse_poll_id(raw: &str) -> Result<PollId, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("invalid poll id '{raw}': {e}")))
}

fn parse_question_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim())
        .map_err(|e| ApiError::BadRequest(format!("invalid question id '{raw}': {e}")))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// `GET /api/health`
pub async fn health<S: KeyValueStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .registry
        .store()
        .health_check()
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "store": "up",
        "archive": state.archive.name(),
        "date": state.registry.today(),
    })))
}

// ---------------------------------------------------------------------------
// Live polls
// ---------------------------------------------------------------------------

/// `POST /api/polls`
pub async fn create_poll<S: KeyValueStore>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(owner): Authenticated,
    payload: Result<Json<NewPoll>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let id = state.registry.create_poll(request, &owner).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "poll_id": id })),
    ))
}

/// `GET /api/polls`
pub async fn list_polls<S: KeyValueStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<impl IntoResponse, ApiError> {
    let polls = state.registry.list_today_polls().await?;
    Ok(Json(serde_json::json!({
        "date": state.registry.today(),
        "count": polls.len(),
        "polls": polls,
    })))
}

/// `GET /api/polls/{id}`
pub async fn get_poll<S: KeyValueStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Poll>, ApiError> {
    let id = parse_poll_id(&id)?;
    Ok(Json(state.registry.get_poll(id).await?))
}

/// `DELETE /api/polls/{id}`
pub async fn delete_poll<S: KeyValueStore>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(_caller): Authenticated,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_poll_id(&id)?;
    state.registry.delete_poll(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/polls/{id}/votes`
pub async fn record_vote<S: KeyValueStore>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(voter): Authenticated,
    Path(id): Path<String>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Json<VoteResult>, ApiError> {
    let id = parse_poll_id(&id)?;
    let Json(vote) = payload
        .map_err(|e| ApiError::BadRequest(format!("invalid vote request: {}", e.body_text())))?;
    let result = state
        .counter
        .record_vote(id, &voter, Choice::from_flag(vote.is_first_choice))
        .await?;
    Ok(Json(result))
}

/// `GET /api/polls/{id}/tally`
pub async fn get_tally<S: KeyValueStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<TallyResponse>, ApiError> {
    let poll_id = parse_poll_id(&id)?;
    let tally = state.counter.tally(poll_id).await?;
    Ok(Json(TallyResponse { poll_id, tally }))
}

/// `POST /api/polls/{id}/archive`
pub async fn archive_poll<S: KeyValueStore>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_poll_id(&id)?;
    let poll = state.registry.get_poll(id).await?;
    let mut snapshot = NewArchivedQuestion::from_poll(&poll);
    if snapshot.created_by.is_empty() {
        snapshot.created_by = caller.to_string();
    }
    let archived = state.archive.create(snapshot).await?;
    tracing::info!(poll_id = %id, question_id = %archived.question_id, "Poll archived");
    Ok((StatusCode::CREATED, Json(archived)))
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

/// `GET /api/archive`
pub async fn list_archived<S: KeyValueStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<impl IntoResponse, ApiError> {
    let questions = state.archive.list().await?;
    Ok(Json(serde_json::json!({
        "count": questions.len(),
        "questions": questions,
    })))
}

/// `POST /api/archive`
pub async fn create_archived<S: KeyValueStore>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    payload: Result<Json<NewArchivedQuestion>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(mut question) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if question.question_text.trim().is_empty() {
        return Err(ApiError::BadRequest("question_text must not be blank".to_owned()));
    }
    question.created_by = caller.to_string();
    let archived = state.archive.create(question).await?;
    Ok((StatusCode::CREATED, Json(archived)))
}

/// `GET /api/archive/latest`
pub async fn latest_archived<S: KeyValueStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<ArchivedQuestion>, ApiError> {
    state
        .archive
        .latest()
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("no archived questions".to_owned()))
}

/// `GET /api/archive/{id}`
pub async fn get_archived<S: KeyValueStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ArchivedQuestion>, ApiError> {
    let id = parse_question_id(&id)?;
    Ok(Json(state.archive.get(id).await?))
}

/// `DELETE /api/archive/{id}`
pub async fn delete_archived<S: KeyValueStore>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(_caller): Authenticated,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_question_id(&id)?;
    state.archive.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
