//! Document management endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{Document, NewDocument, UpdateDocument};

/// GET /api/documents - List documents, newest first
pub async fn list_documents(State(state): State<AppState>) -> Result<Json<Vec<Document>>> {
    Ok(Json(state.coordinator().list_documents()?))
}

/// POST /api/documents - Register an uploaded document
pub async fn create_document(
    State(state): State<AppState>,
    Json(document): Json<NewDocument>,
) -> Result<(StatusCode, Json<Document>)> {
    let created = state.coordinator().create_document(document)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/documents/:id
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Document>> {
    Ok(Json(state.coordinator().get_document(id)?))
}

/// PATCH /api/documents/:id
pub async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<UpdateDocument>,
) -> Result<Json<Document>> {
    Ok(Json(state.coordinator().update_document(id, update)?))
}

/// Response from delete
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub id: i64,
}

/// DELETE /api/documents/:id
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteResponse>> {
    state.coordinator().remove_document(id)?;
    Ok(Json(DeleteResponse { id }))
}
