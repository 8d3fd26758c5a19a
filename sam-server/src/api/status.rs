use axum::{Json, extract::State, response::IntoResponse};
use sam_sdk::objects::StatusResponse;

use crate::state::AppState;

/// `GET /status` — what the poll loop is doing and how it has fared.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let seen_events = match state.store.count().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to count seen events");
            None
        }
    };

    let status = state.status.read().await.clone();
    Json(StatusResponse {
        organization: state.organization.to_string(),
        state: status.state,
        started_at: status.started_at.unix_timestamp(),
        last_tick_at: status.last_tick_at.map(|t| t.unix_timestamp()),
        last_successful_tick_at: status.last_successful_tick_at.map(|t| t.unix_timestamp()),
        ticks: status.ticks,
        consecutive_failures: status.consecutive_failures,
        last_tick: status.last_report.map(Into::into),
        last_error: status.last_error,
        seen_events,
    })
}
