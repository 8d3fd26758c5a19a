use std::time::Duration;

use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use url::Url;

use super::BotToken;
use crate::client::{ClientError, parse_response};
use crate::objects::discord::{CreateMessage, Message};

/// Root of the versioned REST API. The trailing slash matters for `Url::join`.
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Typed HTTP client for the Discord REST endpoints the announcer uses.
#[derive(Debug, Clone)]
pub struct DiscordRest {
    http: Client,
    base_url: Url,
    token: BotToken,
}

impl DiscordRest {
    pub fn new(base_url: Url, token: BotToken) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            base_url,
            token,
        }
    }

    /// Client against [`DISCORD_API_BASE`].
    pub fn public(token: BotToken) -> Result<Self, ClientError> {
        Ok(Self::new(Url::parse(DISCORD_API_BASE)?, token))
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /channels/{channel_id}/messages`
    pub async fn create_message(
        &self,
        channel_id: &str,
        message: &CreateMessage,
    ) -> Result<Message, ClientError> {
        let url = self
            .base_url
            .join(&format!("channels/{channel_id}/messages"))?;

        let resp = self
            .http
            .post(url)
            .header(AUTHORIZATION, self.token.authorization())
            .json(message)
            .send()
            .await?;

        parse_response(resp).await
    }

    /// `PATCH /channels/{channel_id}/messages/{message_id}`
    pub async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        message: &CreateMessage,
    ) -> Result<Message, ClientError> {
        let url = self
            .base_url
            .join(&format!("channels/{channel_id}/messages/{message_id}"))?;

        let resp = self
            .http
            .patch(url)
            .header(AUTHORIZATION, self.token.authorization())
            .json(message)
            .send()
            .await?;

        parse_response(resp).await
    }
}
