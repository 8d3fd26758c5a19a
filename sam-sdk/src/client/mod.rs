//! HTTP and gateway clients.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `reqwest` or `tokio-tungstenite`.

pub mod discord;
mod peoply;

pub use discord::{
    BotToken, DiscordGateway, DiscordRest, GatewayError, GatewayOptions, GatewayState,
    ReconnectConfig,
};
pub use peoply::{
    PEOPLY_API_BASE, PEOPLY_WEB_BASE, PeoplyClient, extract_next_data, format_after_date,
};

use reqwest::StatusCode;

/// Errors produced by the SDK HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, timeout, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// The server asked us to slow down.
    #[error("rate limited, retry after {retry_after:.2}s")]
    RateLimited { retry_after: f64 },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// A page did not carry the data we scrape from it.
    #[error("missing metadata: {0}")]
    MissingMetadata(&'static str),
}

impl ClientError {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Http(_) | ClientError::RateLimited { .. } => true,
            ClientError::Api { status, .. } => status.is_server_error(),
            ClientError::Json(_) | ClientError::Url(_) | ClientError::MissingMetadata(_) => false,
        }
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = serde_json::from_str::<crate::objects::discord::ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.retry_after)
                .unwrap_or(1.0);
            return Err(ClientError::RateLimited { retry_after });
        }
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}
