//! Discord delivery configuration.

use sam_sdk::client::BotToken;

/// Target channel and bot credential.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    /// Snowflake id of the announcement channel.
    pub channel_id: String,
    pub token: BotToken,
}
