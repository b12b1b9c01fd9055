//! HTTP routes and handlers

use crate::auth::{extract_bearer, ingest};
use crate::server::error::ApiError;
use crate::storage::TelemetryStore;
use crate::telemetry::{
    agent_catalog, Agent, EventsBatchRequest, EventsBatchResponse, GamePlaySubmitRequest,
    GamePlaySubmitResponse, ParticipantResponse, RankingParams, RankingResponse, Replay,
    SessionEndRequest, SessionStartRequest, SessionStartResponse, SKIPPED_AGENT_RUN_ID,
};
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TelemetryStore>,
    /// Key for signing and verifying ingest tokens
    pub ingest_secret: Arc<[u8]>,
    /// Lifetime of tokens issued at session start
    pub ingest_ttl: u64,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/participants", post(create_participant))
        .route("/api/session/start", post(start_session))
        .route("/api/session/end", post(end_session))
        .route("/api/events/batch", post(ingest_events))
        .route("/api/agents", get(list_agents))
        .route("/api/gameplay", post(submit_gameplay))
        .route("/api/gameplay/rankings", get(rankings))
        .route("/api/replays/{replay_id}", get(get_replay))
        .fallback(not_found)
        .with_state(state)
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not Found".to_string())
}

async fn create_participant(
    State(state): State<AppState>,
) -> Result<Json<ParticipantResponse>, ApiError> {
    let id = state.store.create_participant().await?;
    Ok(Json(ParticipantResponse { id }))
}

async fn start_session(
    State(state): State<AppState>,
    payload: Result<Json<SessionStartRequest>, JsonRejection>,
) -> Result<Json<SessionStartResponse>, ApiError> {
    let Json(req) = payload?;
    req.validate()?;

    if !state.store.participant_exists(&req.participant_id).await? {
        return Err(ApiError::NotFound("Participant not found".to_string()));
    }

    let session_id = state.store.create_session(&req).await?;
    let ingest_token = ingest::issue(&state.ingest_secret, &session_id, state.ingest_ttl)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!(
        session_id = %session_id,
        participant_id = %req.participant_id,
        mode = req.mode.as_str(),
        "Session started"
    );

    Ok(Json(SessionStartResponse {
        session_id,
        ingest_token,
    }))
}

async fn end_session(
    State(state): State<AppState>,
    payload: Result<Json<SessionEndRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    req.validate()?;

    state.store.end_session(&req).await?;

    info!(session_id = %req.session_id, duration_ms = ?req.duration_ms, "Session ended");
    Ok(Json(json!({ "ok": true })))
}

async fn ingest_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<EventsBatchRequest>, JsonRejection>,
) -> Result<Json<EventsBatchResponse>, ApiError> {
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let token = extract_bearer(authorization).ok_or(ApiError::MissingToken)?;

    let claims = ingest::verify(&state.ingest_secret, token).map_err(|e| {
        debug!(error = %e, "Rejected ingest token");
        ApiError::from(e)
    })?;

    let Json(req) = payload?;
    req.validate()?;

    if claims.sid != req.session_id {
        warn!(
            token_session = %claims.sid,
            body_session = %req.session_id,
            "Ingest token used for another session"
        );
        return Err(ApiError::SessionMismatch);
    }

    if !state.store.session_exists(&req.session_id).await? {
        return Err(ApiError::NotFound("Session not found".to_string()));
    }

    let count = if req.events.is_empty() {
        0
    } else {
        state.store.append_events(&req.session_id, &req.events).await?
    };

    debug!(
        session_id = %req.session_id,
        request_id = ?req.request_id,
        count = count,
        "Ingested event batch"
    );

    Ok(Json(EventsBatchResponse {
        accepted: true,
        count,
    }))
}

async fn list_agents() -> Json<Vec<Agent>> {
    Json(agent_catalog())
}

async fn submit_gameplay(
    State(state): State<AppState>,
    payload: Result<Json<GamePlaySubmitRequest>, JsonRejection>,
) -> Result<Json<GamePlaySubmitResponse>, ApiError> {
    let Json(req) = payload?;
    req.validate()?;

    if req.is_agent_run() {
        debug!(nickname = %req.nickname, "Skipping agent gameplay");
        return Ok(Json(GamePlaySubmitResponse {
            id: SKIPPED_AGENT_RUN_ID.to_string(),
            message: format!("Gameplay from AI agent '{}' was not stored", req.nickname),
        }));
    }

    let id = state.store.insert_gameplay(&req).await?;

    info!(gameplay_id = %id, score = req.score, frames = req.frames.len(), "Gameplay stored");
    Ok(Json(GamePlaySubmitResponse {
        id,
        message: "Gameplay stored".to_string(),
    }))
}

async fn rankings(
    State(state): State<AppState>,
    params: Result<Query<RankingParams>, QueryRejection>,
) -> Result<Json<RankingResponse>, ApiError> {
    let Query(params) = params?;
    let query = params.resolve().map_err(ApiError::InvalidQuery)?;

    let (rankings, total) = state.store.rankings(&query).await?;

    Ok(Json(RankingResponse {
        rankings,
        total,
        page: query.page,
        page_size: query.page_size,
    }))
}

async fn get_replay(
    State(state): State<AppState>,
    Path(replay_id): Path<String>,
) -> Result<Json<Replay>, ApiError> {
    state
        .store
        .get_replay(&replay_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Replay not found".to_string()))
}
