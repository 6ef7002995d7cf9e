//! API routes for the ingestion server

pub mod documents;
pub mod ingestion;

use axum::{
    routing::{get, post},
    Router,
};
use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Document management
        .route(
            "/documents",
            get(documents::list_documents).post(documents::create_document),
        )
        .route(
            "/documents/:id",
            get(documents::get_document)
                .patch(documents::update_document)
                .delete(documents::delete_document),
        )
        // Ingestion lifecycle
        .route("/documents/:id/ingest", post(ingestion::trigger_ingestion))
        .route("/documents/:id/retry", post(ingestion::retry_ingestion))
        .route("/documents/:id/status", get(ingestion::get_ingestion_status))
        // Info
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "doc-ingest",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Document registry with asynchronous ingestion",
        "endpoints": {
            "GET /api/documents": "List all documents",
            "POST /api/documents": "Register a document",
            "GET /api/documents/:id": "Get document details",
            "PATCH /api/documents/:id": "Update a document",
            "DELETE /api/documents/:id": "Delete a document",
            "POST /api/documents/:id/ingest": "Start ingestion",
            "POST /api/documents/:id/retry": "Retry ingestion",
            "GET /api/documents/:id/status": "Get ingestion status"
        }
    }))
}
