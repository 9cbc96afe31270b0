use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::SharedState;

/// GET /api/health
///
/// Reports uptime and whether the session store answers a ping. The tarpit
/// keeps serving while the store is down, so that is `degraded`, not an
/// error status.
pub async fn health_check(State(state): State<SharedState>) -> Json<Value> {
    let uptime = state.start_time.elapsed().as_secs();
    let store_ok = match state.tracker.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "session store ping failed");
            false
        }
    };

    Json(json!({
        "status": if store_ok { "healthy" } else { "degraded" },
        "store": {
            "backend": state.tracker.backend_name(),
            "reachable": store_ok,
        },
        "uptime_secs": uptime,
        "version": env!("CARGO_PKG_VERSION")
    }))
}
