use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::SharedState;

/// GET /api/stats
///
/// Aggregated counters, bot tag counts and the model shape.
pub async fn get_stats(State(state): State<SharedState>) -> Json<Value> {
    let uptime_secs = state.start_time.elapsed().as_secs();
    let metrics = &state.metrics;
    let total_requests = metrics.requests_total.get();

    let requests_per_second = if uptime_secs > 0 {
        total_requests as f64 / uptime_secs as f64
    } else {
        0.0
    };

    Json(json!({
        "total_requests": total_requests,
        "streams_active": metrics.streams_active.get(),
        "streams_completed": metrics.streams_completed.get(),
        "streams_cancelled": metrics.streams_cancelled.get(),
        "words_streamed": metrics.words_streamed.get(),
        "sessions_ended": metrics.session_dwell.get_sample_count(),
        "total_dwell_secs": metrics.session_dwell.get_sample_sum(),
        "store_errors": metrics.store_errors.get(),
        "invalid_ip": metrics.invalid_ip.get(),
        "bot_tags": state.tags.snapshot(),
        "model": state.model,
        "uptime_secs": uptime_secs,
        "requests_per_second": requests_per_second
    }))
}
