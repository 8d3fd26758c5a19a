//! Event source: fetches the current listing of the configured organization.

use async_trait::async_trait;
use reqwest::StatusCode;
use sam_sdk::client::{ClientError, PeoplyClient};
use sam_sdk::objects::PeoplyEvent;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SourceConfig;
use crate::listing::{Event, PEOPLY_EVENT_URL_BASE};

/// Errors that can occur while fetching the listing.
///
/// Any of these skips the tick; none of them means "zero events".
#[derive(Debug, Error)]
pub enum SourceError {
    /// The service answered with a non-success status.
    #[error("listing service returned HTTP {status}")]
    Http { status: u16 },

    /// Transport failure, including client-side timeouts.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The response body was not what we expected.
    #[error("response parsing error: {0}")]
    Parse(String),

    /// The organization page did not yield an organization id.
    #[error("organization not found: {0}")]
    OrganizationNotFound(String),
}

impl From<ClientError> for SourceError {
    fn from(value: ClientError) -> Self {
        match value {
            ClientError::Http(e) => SourceError::Request(e),
            ClientError::Api { status, .. } => SourceError::Http {
                status: status.as_u16(),
            },
            ClientError::RateLimited { .. } => SourceError::Http {
                status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
            },
            ClientError::Json(e) => SourceError::Parse(e.to_string()),
            ClientError::Url(e) => SourceError::Parse(e.to_string()),
            ClientError::MissingMetadata(what) => SourceError::Parse(what.to_string()),
        }
    }
}

/// Source of event listings.
///
/// Implementations return the complete current listing on every call, in
/// listing order, without caching results between calls.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch_events(&self) -> Result<Vec<Event>, SourceError>;
}

/// [`EventSource`] reading one organization from Peoply.
pub struct PeoplyEventSource {
    client: PeoplyClient,
    organization: String,
    organization_id: OnceCell<Uuid>,
}

impl PeoplyEventSource {
    pub fn new(client: PeoplyClient, config: &SourceConfig) -> Self {
        let organization_id = match config.organization_uuid {
            Some(id) => OnceCell::new_with(Some(id)),
            None => OnceCell::new(),
        };
        Self {
            client,
            organization: config.organization.clone(),
            organization_id,
        }
    }

    /// Resolve the organization UUID once; failures are retried next call.
    async fn organization_id(&self) -> Result<Uuid, SourceError> {
        let id = self
            .organization_id
            .get_or_try_init(|| async {
                let id = self
                    .client
                    .resolve_organization_id(&self.organization)
                    .await
                    .map_err(|e| match e {
                        ClientError::MissingMetadata(_) => {
                            SourceError::OrganizationNotFound(self.organization.clone())
                        }
                        ClientError::Api { status, .. } if status == StatusCode::NOT_FOUND => {
                            SourceError::OrganizationNotFound(self.organization.clone())
                        }
                        other => SourceError::from(other),
                    })?;
                info!(
                    organization = %self.organization,
                    organization_id = %id,
                    "Resolved organization"
                );
                Ok::<_, SourceError>(id)
            })
            .await?;
        Ok(*id)
    }
}

#[async_trait]
impl EventSource for PeoplyEventSource {
    async fn fetch_events(&self) -> Result<Vec<Event>, SourceError> {
        let organization_id = self.organization_id().await?;
        let raw = self
            .client
            .list_events(organization_id, OffsetDateTime::now_utc())
            .await?;

        let total = raw.len();
        let events: Vec<Event> = raw.into_iter().filter_map(event_from_peoply).collect();
        debug!(
            organization = %self.organization,
            total,
            usable = events.len(),
            "Fetched listing"
        );
        Ok(events)
    }
}

/// Convert a wire entry into an [`Event`]. Entries without `urlId` are
/// dropped.
pub fn event_from_peoply(raw: PeoplyEvent) -> Option<Event> {
    let Some(id) = raw.url_id.filter(|id| !id.trim().is_empty()) else {
        warn!(title = ?raw.title, "Skipping listing entry without urlId");
        return None;
    };

    Some(Event {
        url: format!("{PEOPLY_EVENT_URL_BASE}{id}"),
        title: raw.title.unwrap_or_default(),
        description: raw.description.unwrap_or_default(),
        start: parse_instant(&id, "startDate", raw.start_date.as_deref()),
        end: parse_instant(&id, "endDate", raw.end_date.as_deref()),
        location: raw.location_name.unwrap_or_default(),
        image: raw.image_url.filter(|url| !url.trim().is_empty()),
        updated_at: parse_instant(&id, "updatedAt", raw.updated_at.as_deref()),
        id,
    })
}

fn parse_instant(event_id: &str, field: &str, value: Option<&str>) -> Option<OffsetDateTime> {
    let value = value?;
    match OffsetDateTime::parse(value, &Rfc3339) {
        Ok(at) => Some(at),
        Err(e) => {
            warn!(event_id = %event_id, field, value, error = %e, "Unparseable timestamp");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::{Path, Query};
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::get;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::macros::datetime;
    use url::Url;

    const ORG_ID: &str = "7d1b5c3e-2f7a-4b2a-9a55-0c1f2e3d4b5a";

    #[test]
    fn test_event_from_peoply_full() {
        let raw = PeoplyEvent {
            url_id: Some("bedpres-oktober".to_string()),
            title: Some("Bedpres".to_string()),
            description: Some("Pizza".to_string()),
            start_date: Some("2025-10-16T16:15:00.000Z".to_string()),
            end_date: Some("2025-10-16T18:00:00.000Z".to_string()),
            location_name: Some("OJD".to_string()),
            image_url: Some("https://cdn.peoply.app/x.png".to_string()),
            updated_at: Some("2025-10-01T10:00:00.000Z".to_string()),
        };
        let event = event_from_peoply(raw).unwrap();
        assert_eq!(event.id, "bedpres-oktober");
        assert_eq!(event.url, "https://peoply.app/events/bedpres-oktober");
        assert_eq!(event.start, Some(datetime!(2025-10-16 16:15 UTC)));
        assert_eq!(event.end, Some(datetime!(2025-10-16 18:00 UTC)));
        assert_eq!(event.image.as_deref(), Some("https://cdn.peoply.app/x.png"));
    }

    #[test]
    fn test_event_from_peoply_missing_fields() {
        let raw = PeoplyEvent {
            url_id: Some("x".to_string()),
            start_date: Some("not a date".to_string()),
            image_url: Some(" ".to_string()),
            ..Default::default()
        };
        let event = event_from_peoply(raw).unwrap();
        assert_eq!(event.title, "");
        assert_eq!(event.start, None);
        assert_eq!(event.image, None);

        assert!(event_from_peoply(PeoplyEvent::default()).is_none());
        assert!(
            event_from_peoply(PeoplyEvent {
                url_id: Some(String::new()),
                ..Default::default()
            })
            .is_none()
        );
    }

    async fn serve(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    fn fake_peoply(page_hits: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/orgs/{slug}",
                get(move |Path(slug): Path<String>| {
                    let page_hits = page_hits.clone();
                    async move {
                        page_hits.fetch_add(1, Ordering::SeqCst);
                        if slug != "progsys" {
                            return (AxumStatus::NOT_FOUND, String::new());
                        }
                        (
                            AxumStatus::OK,
                            format!(
                                r#"<html><script id="__NEXT_DATA__" type="application/json">{{"props":{{"pageProps":{{"organization":{{"id":"{ORG_ID}"}}}}}}}}</script></html>"#
                            ),
                        )
                    }
                }),
            )
            .route(
                "/events",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    if q.get("organizationId").map(String::as_str) != Some(ORG_ID)
                        || !q.get("afterDate").is_some_and(|d| d.ends_with('Z'))
                    {
                        return (AxumStatus::BAD_REQUEST, String::new());
                    }
                    (
                        AxumStatus::OK,
                        r#"[{"urlId":"a","title":"A"},{"title":"no id"},{"urlId":"b","title":"B"}]"#
                            .to_string(),
                    )
                }),
            )
    }

    #[tokio::test]
    async fn test_fetch_resolves_organization_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = serve(fake_peoply(hits.clone())).await;
        let client = PeoplyClient::new(base.clone(), base);
        let source = PeoplyEventSource::new(
            client,
            &SourceConfig {
                organization: "progsys".to_string(),
                organization_uuid: None,
            },
        );

        let events = source.fetch_events().await.unwrap();
        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);

        source.fetch_events().await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_configured_uuid_skips_page() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = serve(fake_peoply(hits.clone())).await;
        let client = PeoplyClient::new(base.clone(), base);
        let source = PeoplyEventSource::new(
            client,
            &SourceConfig {
                organization: "whatever".to_string(),
                organization_uuid: Some(ORG_ID.parse().unwrap()),
            },
        );

        assert_eq!(source.fetch_events().await.unwrap().len(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_organization_is_an_error() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = serve(fake_peoply(hits.clone())).await;
        let client = PeoplyClient::new(base.clone(), base);
        let source = PeoplyEventSource::new(
            client,
            &SourceConfig {
                organization: "nobody".to_string(),
                organization_uuid: None,
            },
        );

        assert!(matches!(
            source.fetch_events().await,
            Err(SourceError::OrganizationNotFound(org)) if org == "nobody"
        ));
        // Not cached: the next tick tries again.
        let _ = source.fetch_events().await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
