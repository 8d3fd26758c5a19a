use axum::{Json, extract::Query, extract::State, response::IntoResponse};
use sam_sdk::objects::{ListEventsQuery, SeenEventResponse};

use super::ApiError;
use crate::state::AppState;

/// `GET /events` — seen records with pagination.
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<ListEventsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let records = state
        .store
        .list(query.clamped_limit(), query.offset)
        .await
        .map_err(ApiError::Store)?;

    let response: Vec<SeenEventResponse> = records.into_iter().map(Into::into).collect();
    Ok(Json(response))
}
