/*
 * Responsibility
 * - GET /api/v1/documents/{document_id}
 * - Access is decided per resource by the external policy service before this runs
 */
use axum::{Json, extract::Path};
use serde::Serialize;

use crate::api::v1::extractors::AuthCtxExtractor;
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub id: String,
    pub requested_by: String,
}

pub async fn get_document(
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Path(document_id): Path<String>,
) -> Result<Json<DocumentResponse>, AppError> {
    if document_id.trim().is_empty() {
        return Err(AppError::not_found("document"));
    }
    Ok(Json(DocumentResponse {
        id: document_id,
        requested_by: ctx.subject().to_string(),
    }))
}
