//! Ingestion trigger and status endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::StatusRecord;

/// Response from trigger and retry
#[derive(Debug, Serialize)]
pub struct IngestionResponse {
    pub message: String,
}

/// POST /api/documents/:id/ingest - Hand a document to the worker
pub async fn trigger_ingestion(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<IngestionResponse>> {
    let dispatch = state.coordinator().trigger_ingestion(id).await?;
    Ok(Json(IngestionResponse {
        message: dispatch.message.to_string(),
    }))
}

/// POST /api/documents/:id/retry
pub async fn retry_ingestion(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<IngestionResponse>> {
    let dispatch = state.coordinator().retry_ingestion(id).await?;
    Ok(Json(IngestionResponse {
        message: dispatch.message.to_string(),
    }))
}

/// GET /api/documents/:id/status - Poll the worker and persist terminal outcomes
pub async fn get_ingestion_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<StatusRecord>> {
    Ok(Json(state.coordinator().get_ingestion_status(id).await?))
}
