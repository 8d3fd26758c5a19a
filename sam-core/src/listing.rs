//! Domain types for one fetched event listing.

use std::fmt;

use time::OffsetDateTime;

use crate::utils::fingerprint::fingerprint_event;

/// Public page of an event on Peoply.
pub const PEOPLY_EVENT_URL_BASE: &str = "https://peoply.app/events/";

/// One event as seen in the current fetch.
///
/// Built fresh on every tick and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Identity from the source service (Peoply `urlId`).
    pub id: String,
    pub title: String,
    pub description: String,
    pub start: Option<OffsetDateTime>,
    pub end: Option<OffsetDateTime>,
    pub location: String,
    /// Image reference, sent as an embed image.
    pub image: Option<String>,
    /// Public sign-up link.
    pub url: String,
    /// Server-side modification time. Informational only, not part of the
    /// fingerprint.
    pub updated_at: Option<OffsetDateTime>,
}

impl Event {
    /// Content fingerprint used for change detection.
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint_event(self)
    }
}

/// Hex-encoded content hash of an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why an event is being announced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    /// Never announced before.
    New,
    /// Announced before with a different fingerprint.
    Updated {
        /// Message of the previous announcement, edited when still present.
        previous_message: Option<String>,
    },
}

impl ChangeKind {
    pub fn is_update(&self) -> bool {
        matches!(self, ChangeKind::Updated { .. })
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::New => f.write_str("new"),
            ChangeKind::Updated { .. } => f.write_str("updated"),
        }
    }
}

/// Outcome of a successful notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Chat message carrying the announcement.
    pub message_id: String,
}
