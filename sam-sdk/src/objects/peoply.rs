//! Peoply listing payloads.
//!
//! Every field is optional on the wire. Callers decide which missing fields
//! are fatal for an entry (only `urlId` is, for the announcer).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single event as returned by `GET https://api.peoply.app/events`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PeoplyEvent {
    /// Stable slug of the event, also used in its public URL.
    pub url_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// ISO-8601 start time, e.g. `2025-10-16T16:15:00.000Z`.
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub location_name: Option<String>,
    pub image_url: Option<String>,
    /// Last modification time on the Peoply side.
    pub updated_at: Option<String>,
}

/// The events endpoint answers a list, but occasionally a bare object when a
/// single event matches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EventsPayload {
    Many(Vec<PeoplyEvent>),
    One(Box<PeoplyEvent>),
}

impl EventsPayload {
    /// Flatten the payload into listing order.
    pub fn into_events(self) -> Vec<PeoplyEvent> {
        match self {
            EventsPayload::Many(events) => events,
            EventsPayload::One(event) => vec![*event],
        }
    }
}

/// The Next.js bootstrap document embedded in `https://peoply.app/orgs/{slug}`.
///
/// Only the path `props.pageProps.organization.id` is modelled.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NextData {
    pub props: NextProps,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NextProps {
    pub page_props: PageProps,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageProps {
    pub organization: Option<Organization>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Organization {
    pub id: Uuid,
}

impl NextData {
    /// The organization UUID, if the page carried one.
    pub fn organization_id(&self) -> Option<Uuid> {
        self.props.page_props.organization.as_ref().map(|org| org.id)
    }
}
