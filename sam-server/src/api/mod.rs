//! Status API handlers.
//!
//! Read-only. A failure here never reaches the poll loop.
//!
//! # Endpoints
//!
//! - `GET /status` – loop state, last successful tick, seen-event count
//! - `GET /events` – seen records, newest first (paginated)

use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use sam_core::store::StoreError;

use crate::state::AppState;

mod list_events;
mod status;

/// Build the status API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(status::status))
        .route("/events", get(list_events::list_events))
}

/// Errors that can occur in status API handlers.
#[derive(Debug)]
pub(crate) enum ApiError {
    Store(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::Store(e) => {
                tracing::error!(error = %e, "Status API store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
        }
    }
}
