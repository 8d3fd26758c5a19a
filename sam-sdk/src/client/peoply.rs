//! Peoply client (organization page scraping + events API).
//!
//! Peoply does not expose an organization lookup endpoint. The organization
//! UUID is read from the Next.js bootstrap document embedded in the public
//! organization page, then used against the JSON events API.

use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use reqwest::header::{ACCEPT, USER_AGENT};
use time::OffsetDateTime;
use time::macros::format_description;
use url::Url;
use uuid::Uuid;

use super::{ClientError, parse_response};
use crate::objects::peoply::{EventsPayload, NextData, PeoplyEvent};

/// Root of the public website.
pub const PEOPLY_WEB_BASE: &str = "https://peoply.app/";
/// Root of the JSON API.
pub const PEOPLY_API_BASE: &str = "https://api.peoply.app/";

/// The organization page is served differently to non-browser agents.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/141.0.0.0 Safari/537.36";
const API_USER_AGENT: &str = "SamTheScraper/1.0 (+https://github.com/IFI-Prog-Sys/sam/)";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

lazy_static! {
    static ref NEXT_DATA_SCRIPT: Regex = Regex::new(
        r#"(?s)<script[^>]*\bid="__NEXT_DATA__"[^>]*>(.*?)</script>"#
    )
    .expect("valid __NEXT_DATA__ pattern");
}

/// Typed HTTP client for Peoply.
#[derive(Debug, Clone)]
pub struct PeoplyClient {
    http: Client,
    web_base: Url,
    api_base: Url,
}

impl PeoplyClient {
    /// Create a new `PeoplyClient`.
    ///
    /// * `web_base` – root of the website serving `/orgs/{slug}`.
    /// * `api_base` – root of the JSON API serving `/events`.
    pub fn new(web_base: Url, api_base: Url) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            web_base,
            api_base,
        }
    }

    /// Client against the public Peoply hosts.
    pub fn public() -> Result<Self, ClientError> {
        Ok(Self::new(
            Url::parse(PEOPLY_WEB_BASE)?,
            Url::parse(PEOPLY_API_BASE)?,
        ))
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `GET /orgs/{slug}` – raw HTML of the organization page.
    pub async fn organization_page(&self, slug: &str) -> Result<String, ClientError> {
        let url = self
            .web_base
            .join(&format!("orgs/{}", urlencoding::encode(slug)))?;

        let resp = self
            .http
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, body });
        }
        Ok(resp.text().await?)
    }

    /// Resolve an organization slug to the UUID the events API expects.
    pub async fn resolve_organization_id(&self, slug: &str) -> Result<Uuid, ClientError> {
        let html = self.organization_page(slug).await?;
        let script = extract_next_data(&html)
            .ok_or(ClientError::MissingMetadata("__NEXT_DATA__ script"))?;
        let data: NextData = serde_json::from_str(script.trim())?;
        data.organization_id()
            .ok_or(ClientError::MissingMetadata("props.pageProps.organization.id"))
    }

    /// `GET /events?afterDate=…&organizationId=…` – upcoming events of an
    /// organization, in listing order.
    ///
    /// The endpoint returns the full set in one response.
    pub async fn list_events(
        &self,
        organization_id: Uuid,
        after: OffsetDateTime,
    ) -> Result<Vec<PeoplyEvent>, ClientError> {
        let url = self.api_base.join("events")?;
        let after_date = format_after_date(after);
        let organization_id = organization_id.to_string();

        let resp = self
            .http
            .get(url)
            .query(&[
                ("afterDate", after_date.as_str()),
                ("organizationId", organization_id.as_str()),
            ])
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, API_USER_AGENT)
            .send()
            .await?;

        let payload: EventsPayload = parse_response(resp).await?;
        Ok(payload.into_events())
    }
}

/// Extract the body of the `<script id="__NEXT_DATA__">` element.
pub fn extract_next_data(html: &str) -> Option<&str> {
    NEXT_DATA_SCRIPT
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|body| !body.trim().is_empty())
}

/// Format a timestamp the way the events API expects:
/// UTC, millisecond precision, `Z` suffix (`2025-10-16T16:15:00.000Z`).
pub fn format_after_date(at: OffsetDateTime) -> String {
    let format = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    );
    at.to_offset(time::UtcOffset::UTC)
        .format(format)
        .unwrap_or_default()
}
