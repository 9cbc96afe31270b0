use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use quagmire_common::QuagmireError;
use serde_json::json;

use crate::state::SharedState;

fn error_response(e: QuagmireError) -> Response {
    let status = match e {
        QuagmireError::InvalidIp(_) | QuagmireError::InvalidKey(_) => StatusCode::BAD_REQUEST,
        QuagmireError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": e.to_string() }))).into_response()
}

/// GET /api/sessions
///
/// Every address currently trapped, from a paged scan of the store.
pub async fn list_sessions(State(state): State<SharedState>) -> Response {
    match state.tracker.list_active_ips().await {
        Ok(mut ips) => {
            ips.sort();
            Json(json!({ "count": ips.len(), "ips": ips })).into_response()
        }
        Err(e) => {
            state.metrics.store_errors.inc();
            error_response(e)
        }
    }
}

/// GET /api/sessions/{ip}
pub async fn get_session(State(state): State<SharedState>, Path(ip): Path<String>) -> Response {
    match state.tracker.session_info(&ip).await {
        Ok(info) => Json(info).into_response(),
        Err(e) => {
            if matches!(e, QuagmireError::StoreUnavailable(_)) {
                state.metrics.store_errors.inc();
            }
            error_response(e)
        }
    }
}
