//! Route handler functions.
//!
//! `upload_and_query` is the whole pipeline in data-flow order: ingestion
//! gate, session load, agent run, chart classification, session save,
//! response assembly.

use axum::extract::{Multipart, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use tabletalk_agent::LastQueryRecorder;
use tabletalk_core::types::ChartSuggestion;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Response types
// =============================================================================

/// The single success payload of the service.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    /// The agent's natural-language answer.
    pub response: String,
    /// The session this turn was recorded under.
    pub session_id: String,
    /// Chart suggestion, or null when the answer is not chart-worthy.
    pub visualize_data: Option<ChartSuggestion>,
    /// The last SQL query the agent executed, when there was one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Handler functions
// =============================================================================

/// GET /health - liveness probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /upload_and_query - the full pipeline.
///
/// Multipart fields: `file` (binary, filename required), `query` (text),
/// `session_id` (optional text; a fresh UUID is issued when absent).
pub async fn upload_and_query(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<QueryResponse>, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut query: Option<String> = None;
    let mut session_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        // Owned copy: reading the field's content consumes it below.
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                let file_name = field
                    .file_name()
                    .map(|n| n.to_string())
                    .ok_or_else(|| {
                        ApiError::BadRequest("Field 'file' must carry a filename".to_string())
                    })?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
                file = Some((file_name, bytes.to_vec()));
            }
            Some("query") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read query: {}", e)))?;
                query = Some(text);
            }
            Some("session_id") => {
                let text = field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read session_id: {}", e))
                })?;
                if !text.trim().is_empty() {
                    session_id = Some(text);
                }
            }
            // Unknown fields are ignored.
            _ => {}
        }
    }

    let (file_name, payload) =
        file.ok_or_else(|| ApiError::BadRequest("Missing required field 'file'".to_string()))?;
    let query =
        query.ok_or_else(|| ApiError::BadRequest("Missing required field 'query'".to_string()))?;
    let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());

    info!(file = %file_name, session = %session_id, "Handling upload_and_query");

    // 1. Gate: reuse or rebuild the store.
    let db = state.gate.prepare(&file_name, &payload)?;

    // 2. Replay this session's history.
    let history = state.sessions.load(&session_id)?;

    // 3. Run the agent, recording the last executed query.
    let recorder = LastQueryRecorder::new();
    let answer = state
        .agent
        .run(&db, &history, &query, Some(&recorder))
        .await?;

    // 4. Best-effort chart annotation.
    let visualize_data = state.classifier.classify(&answer).await;

    // 5. Persist the turn, then assemble the payload.
    state.sessions.save(&session_id, &query, &answer)?;

    Ok(Json(QueryResponse {
        response: answer,
        session_id,
        visualize_data,
        sql_query: recorder.take(),
    }))
}
