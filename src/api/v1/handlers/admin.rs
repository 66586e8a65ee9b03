use axum::Json;
use serde_json::{Value, json};

use crate::api::v1::extractors::AuthCtxExtractor;

pub async fn admin(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<Value> {
    tracing::info!(subject = %ctx.subject(), "admin area accessed");
    Json(json!({
        "message": "admin access granted",
        "subject": ctx.subject(),
    }))
}
