use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::SharedState;

/// GET /api/config
///
/// The configuration the process is running with. Store credentials are
/// read from the environment and never appear here.
pub async fn get_config(State(state): State<SharedState>) -> Json<Value> {
    Json(serde_json::to_value(&state.config).unwrap_or_else(|_| json!({"error": "serialization failed"})))
}
