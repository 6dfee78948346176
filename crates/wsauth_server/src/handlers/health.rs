use axum::Json;
use serde_json::json;

/// Liveness only; does not touch the store.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "service": "wsauth_server" }))
}
