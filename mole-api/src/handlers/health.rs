use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::AppState;

/// Liveness plus a database round trip. A failed check answers 503 with
/// the same body shape.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (status, postgresql) = match state.db.health_check().await {
        Ok(()) => (StatusCode::OK, "healthy"),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
        }
    };

    let body = json!({
        "status": if status == StatusCode::OK { "healthy" } else { "degraded" },
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": state.config.environment.as_str(),
        "checks": {
            "postgresql": postgresql,
        }
    });

    (status, Json(body))
}
