//! Axum server setup and router configuration.

use crate::api;
use crate::state::AppState;
use axum::{Json, Router, response::IntoResponse, routing::get};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Build the status API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(api::router())
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the process is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Serve `router` until `shutdown_rx` flips to `true`.
pub async fn run_server(
    router: Router,
    addr: SocketAddr,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Status server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use sam_core::entities::seen_event::SeenRecord;
    use sam_core::processors::TickReport;
    use sam_core::status::shared_loop_status;
    use sam_core::store::MemorySeenEventStore;
    use sam_sdk::objects::{LoopState, SeenEventResponse, StatusResponse};
    use std::sync::Arc;
    use time::OffsetDateTime;
    use tower::ServiceExt;

    fn record(id: &str, at: i64) -> SeenRecord {
        SeenRecord {
            event_id: id.to_string(),
            fingerprint: format!("fp-{id}"),
            notified_at: OffsetDateTime::from_unix_timestamp(at).unwrap(),
            message_id: Some(format!("m-{id}")),
        }
    }

    fn state() -> AppState {
        let store = MemorySeenEventStore::with_records([
            record("a", 100),
            record("b", 200),
            record("c", 300),
        ]);
        AppState::new(Arc::new(store), shared_loop_status(), "ifi-progsys")
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        router: Router,
        uri: &str,
    ) -> (StatusCode, T) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body): (_, serde_json::Value) =
            get_json(build_router(state()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_status_reports_loop_and_store() {
        let state = state();
        {
            let mut status = state.status.write().await;
            status.ticks = 4;
            status.last_successful_tick_at =
                Some(OffsetDateTime::from_unix_timestamp(1_000).unwrap());
            status.last_report = Some(TickReport {
                fetched: 3,
                unchanged: 3,
                ..Default::default()
            });
        }

        let (code, body): (_, StatusResponse) = get_json(build_router(state), "/status").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body.organization, "ifi-progsys");
        assert_eq!(body.state, LoopState::Idle);
        assert_eq!(body.ticks, 4);
        assert_eq!(body.last_successful_tick_at, Some(1_000));
        assert_eq!(body.last_tick.map(|t| t.unchanged), Some(3));
        assert_eq!(body.seen_events, Some(3));
    }

    #[tokio::test]
    async fn test_events_are_paged_newest_first() {
        let (code, body): (_, Vec<SeenEventResponse>) =
            get_json(build_router(state()), "/events?limit=2").await;
        assert_eq!(code, StatusCode::OK);
        let ids: Vec<_> = body.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, ["c", "b"]);
        assert_eq!(body[0].notified_at, 300);
        assert_eq!(body[0].message_id.as_deref(), Some("m-c"));

        let (_, body): (_, Vec<SeenEventResponse>) =
            get_json(build_router(state()), "/events?limit=2&offset=2").await;
        assert_eq!(body.len(), 1);
        assert_eq!(body[0].event_id, "a");
    }

    #[tokio::test]
    async fn test_write_methods_are_not_allowed() {
        let response = build_router(state())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/events")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
