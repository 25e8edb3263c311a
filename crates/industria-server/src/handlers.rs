//! HTTP Handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agent_core::{Message, SessionId, provider::ModelInfo};
use industria::{RecordingSurface, TurnReport, TurnState};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub engine_connected: bool,
    pub sessions: usize,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub conversation_id: String,
    #[serde(flatten)]
    pub report: TurnReport,
}

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub conversation_id: String,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub conversation_id: String,
    pub title: String,
    pub active: bool,
    pub state: TurnState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

fn unknown_session(id: &str) -> ApiError {
    api_error(
        StatusCode::NOT_FOUND,
        "SESSION_NOT_FOUND",
        format!("No conversation with id '{id}'"),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine_connected = state.provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        engine_connected,
        sessions: state.session_count().await,
    })
}

/// Models the reasoning engine can serve
pub async fn list_models(State(state): State<AppState>) -> Result<Json<Vec<ModelInfo>>, ApiError> {
    state.provider.list_models().await.map(Json).map_err(|e| {
        tracing::warn!(error = %e, "Model listing failed");
        api_error(StatusCode::SERVICE_UNAVAILABLE, "ENGINE_UNAVAILABLE", e.user_message())
    })
}

/// Open a conversation explicitly
pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionCreated>) {
    let (id, _) = state.open().await;
    (
        StatusCode::CREATED,
        Json(SessionCreated {
            conversation_id: id.to_string(),
        }),
    )
}

/// Run one operator turn. Opens a conversation when none is named.
///
/// If the client goes away mid-turn the handler future is dropped and the
/// conversation keeps only its committed turns.
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = payload.message.trim();
    if message.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "EMPTY_MESSAGE", "Message must not be empty"));
    }

    let (id, session) = match payload.conversation_id {
        Some(raw) => {
            let id = SessionId::from_string(raw.as_str());
            let session = state.get(&id).await.ok_or_else(|| unknown_session(&raw))?;
            (id, session)
        }
        None => state.open().await,
    };

    let mut surface = RecordingSurface::new();
    let report = session.lock().await.handle(message, &mut surface).await;

    Ok(Json(ChatResponse {
        conversation_id: id.to_string(),
        report,
    }))
}

/// Committed transcript of a conversation
pub async fn get_session(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let id = SessionId::from_string(raw.as_str());
    let shared = state.get(&id).await.ok_or_else(|| unknown_session(&raw))?;
    let session = shared.lock().await;
    let meta = session.session();

    Ok(Json(TranscriptResponse {
        conversation_id: id.to_string(),
        title: meta.title(),
        active: meta.active,
        state: session.state(),
        created_at: meta.created_at,
        updated_at: meta.updated_at,
        messages: session.transcript().to_vec(),
    }))
}

/// End a conversation and forget it
pub async fn delete_session(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = SessionId::from_string(raw.as_str());
    let shared = state.close(&id).await.ok_or_else(|| unknown_session(&raw))?;
    shared.lock().await.end();
    Ok(StatusCode::NO_CONTENT)
}
