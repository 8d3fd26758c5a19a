//! Event source configuration.

use uuid::Uuid;

/// Which Peoply organization to follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// Organization slug, as in `https://peoply.app/orgs/{slug}`.
    pub organization: String,
    /// Known organization UUID. Skips scraping the organization page.
    pub organization_uuid: Option<Uuid>,
}
