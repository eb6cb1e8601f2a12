//! Route handler functions for all API endpoints.
//!
//! Chat handlers delegate to the turn executor under the configured turn
//! timeout. Session and discovery handlers read the session store and tool
//! registry directly.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use barista_chat::{ChatEnvelope, ExecuteOptions, ToolDescriptor, ToolKind, Turn};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request and query parameter types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Absent, unknown, expired or malformed ids all start a new session.
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ToolQueryParams {
    pub query: Option<String>,
    pub session_id: Option<String>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct NewSessionResponse {
    pub session_id: Uuid,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionStatsResponse {
    pub active_sessions: usize,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SessionHistoryResponse {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub turns: Vec<Turn>,
}

#[derive(Debug, Serialize)]
pub struct ToolsResponse {
    pub tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub version: String,
    pub uptime_secs: u64,
}

// =============================================================================
// Chat
// =============================================================================

fn parse_session_id(raw: Option<&str>) -> Option<Uuid> {
    let raw = raw?.trim();
    match Uuid::parse_str(raw) {
        Ok(id) => Some(id),
        Err(_) => {
            if !raw.is_empty() {
                tracing::debug!(session_id = raw, "Malformed session id, starting a new session");
            }
            None
        }
    }
}

async fn run_turn(
    state: &AppState,
    message: &str,
    session_id: Option<Uuid>,
    options: ExecuteOptions,
) -> Result<Json<ChatEnvelope>, ApiError> {
    let timeout = state.turn_timeout();
    match tokio::time::timeout(timeout, state.executor.execute(message, session_id, options)).await
    {
        Ok(result) => Ok(Json(result?)),
        Err(_) => {
            tracing::warn!(
                timeout_secs = timeout.as_secs(),
                "Turn timed out, nothing recorded"
            );
            Err(ApiError::Timeout(format!(
                "The request did not complete within {} seconds",
                timeout.as_secs()
            )))
        }
    }
}

/// POST /chat and POST /api/chat - run one conversational turn.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatEnvelope>, ApiError> {
    let session_id = parse_session_id(req.session_id.as_deref());
    run_turn(&state, &req.message, session_id, ExecuteOptions::default()).await
}

async fn forced_tool_turn(
    state: &AppState,
    params: ToolQueryParams,
    kind: ToolKind,
) -> Result<Json<ChatEnvelope>, ApiError> {
    let query = params
        .query
        .ok_or_else(|| ApiError::BadRequest("Parameter 'query' is required".to_string()))?;
    let session_id = parse_session_id(params.session_id.as_deref());
    run_turn(state, &query, session_id, ExecuteOptions::forced(kind)).await
}

/// GET /products?query= - product similarity search through the agent.
pub async fn products(
    State(state): State<AppState>,
    Query(params): Query<ToolQueryParams>,
) -> Result<Json<ChatEnvelope>, ApiError> {
    forced_tool_turn(&state, params, ToolKind::GetSimilarProducts).await
}

/// GET /outlets?query= - outlet lookup through the agent.
pub async fn outlets(
    State(state): State<AppState>,
    Query(params): Query<ToolQueryParams>,
) -> Result<Json<ChatEnvelope>, ApiError> {
    forced_tool_turn(&state, params, ToolKind::TextToSqlQuery).await
}

// =============================================================================
// Sessions
// =============================================================================

/// POST /session/new
pub async fn new_session(State(state): State<AppState>) -> Json<NewSessionResponse> {
    let handle = state.sessions().create(Utc::now());
    Json(NewSessionResponse {
        session_id: handle.id(),
        message: "New session created".to_string(),
    })
}

/// GET /session/stats
pub async fn session_stats(State(state): State<AppState>) -> Json<SessionStatsResponse> {
    let active = state.sessions().len();
    Json(SessionStatsResponse {
        active_sessions: active,
        message: format!("{} active session(s)", active),
    })
}

/// GET /session/{id}/history - turns of a live session, oldest first.
pub async fn session_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionHistoryResponse>, ApiError> {
    let not_found = || ApiError::NotFound(format!("Session '{}' not found", id));
    let session_id = Uuid::parse_str(&id).map_err(|_| not_found())?;
    let session = state
        .sessions()
        .get(session_id)
        .await
        .ok_or_else(not_found)?;

    Ok(Json(SessionHistoryResponse {
        session_id: session.id,
        created_at: session.created_at,
        last_activity: session.last_activity,
        turns: session.turns,
    }))
}

// =============================================================================
// Discovery
// =============================================================================

/// GET /tools - registered tool descriptors in registration order.
pub async fn tools(State(state): State<AppState>) -> Json<ToolsResponse> {
    Json(ToolsResponse {
        tools: state.executor.registry().list_tools(),
    })
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        message: "Barista chat backend is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET / - welcome document listing the endpoints.
pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "Barista",
        "version": env!("CARGO_PKG_VERSION"),
        "message": "Welcome to the Barista chat backend",
        "endpoints": {
            "POST /chat": "Send a message: {message, session_id?}",
            "POST /api/chat": "Alias of POST /chat",
            "GET /products?query=": "Search drinkware products",
            "GET /outlets?query=": "Look up outlets",
            "POST /session/new": "Start a new session",
            "GET /session/stats": "Count active sessions",
            "GET /session/{id}/history": "Turns of a live session",
            "GET /tools": "Registered tools",
            "GET /health": "Health check",
        }
    }))
}
