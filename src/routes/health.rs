use axum::Json;
use serde_json::{Value, json};

/// Liveness check
///
/// Answers without touching the database and sits outside rate limiting.
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Process is up"),
    ),
    tag = "health"
)]
pub async fn healthz() -> Json<Value> {
    Json(json!({ "success": true, "status": "ok" }))
}
