//! GET /health - liveness probe with model lifecycle state

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::state::AppState;

/// GET /health
///
/// Always 200 while the process is alive. Reading the state does not count
/// as a use of the model.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.gate().stats();
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "model": {
                "state": stats.phase,
                "variant": stats.load_config.variant,
                "device": stats.load_config.device,
                "loads": stats.loads,
                "evictions": stats.evictions,
                "in_flight": stats.in_flight,
                "idle_secs": stats.idle_for.map(|d| d.as_secs()),
            }
        })),
    )
}

/// Build the health router sub-tree
pub fn health_router() -> axum::Router<AppState> {
    use axum::routing::get;
    axum::Router::new().route("/health", get(health))
}
