/*
 * Responsibility
 * - GET /api/v1/me: echo back who the gate says the caller is
 */
use axum::Json;
use serde::Serialize;

use crate::api::v1::extractors::AuthCtxExtractor;
use crate::services::auth::token::ClaimSet;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub subject: String,
    pub issuer: String,
    pub roles: Vec<String>,
    pub expires_at: Option<String>,
    pub claims: ClaimSet,
}

pub async fn me(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<MeResponse> {
    let identity = &ctx.identity;
    Json(MeResponse {
        subject: identity.subject().to_string(),
        issuer: identity.issuer().to_string(),
        roles: identity.roles().iter().cloned().collect(),
        expires_at: identity.expires_at().map(|t| t.to_rfc3339()),
        claims: identity.claims().clone(),
    })
}
