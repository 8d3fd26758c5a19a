//! Discord clients.
//!
//! [`DiscordGateway`] keeps the bot's websocket session alive (presence,
//! heartbeats, resume). [`DiscordRest`] delivers and edits messages.

mod gateway;
mod rest;

pub use gateway::{
    DISCORD_GATEWAY_URL, DiscordGateway, GatewayError, GatewayOptions, GatewayState,
    ReconnectConfig, next_delay,
};
pub use rest::{DISCORD_API_BASE, DiscordRest};

use std::fmt;

/// A bot token. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct BotToken(String);

impl BotToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, as sent in IDENTIFY.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Value of the REST `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("Bot {}", self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for BotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BotToken(<redacted>)")
    }
}
