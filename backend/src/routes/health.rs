use axum::Json;
use axum::response::IntoResponse;
use serde_json::json;

/// Liveness probe. Deliberately does not touch the database: a saturated pool
/// must not make the process look dead.
#[allow(clippy::unused_async)]
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
