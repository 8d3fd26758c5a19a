//! Configuration module for sam-server.
//!
//! Handles loading configuration from the TOML file, CLI arguments and the
//! environment, and turns it into the validated runtime types of `sam-core`.

pub mod file;

use crate::config::file::FileConfig;
use sam_core::config::{DiscordConfig, DisplayConfig, PollingConfig, SourceConfig, Tz};
use sam_sdk::client::BotToken;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable carrying the bot token.
pub const DISCORD_TOKEN_ENV: &str = "DISCORD_TOKEN";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DISCORD_TOKEN environment variable not set")]
    MissingToken,
}

/// Status API settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusConfig {
    pub enabled: bool,
    pub listen: SocketAddr,
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub source: SourceConfig,
    pub discord: DiscordConfig,
    pub store_path: String,
    pub polling: PollingConfig,
    pub display: DisplayConfig,
    pub status: StatusConfig,
    pub log_json: bool,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Read the file and `DISCORD_TOKEN`, apply CLI overrides and validate.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content =
            std::fs::read_to_string(&self.config_path).map_err(|source| ConfigError::IoError {
                path: self.config_path.clone(),
                source,
            })?;
        let file_config: FileConfig = toml::from_str(&config_content)?;
        let token = std::env::var(DISCORD_TOKEN_ENV).ok();
        self.build(file_config, token)
    }

    /// Validate `file_config` together with the token and build the runtime
    /// configuration.
    pub fn build(
        &self,
        mut file_config: FileConfig,
        token: Option<String>,
    ) -> Result<LoadedConfig, ConfigError> {
        if let Some(listen) = self.listen_override {
            file_config.status.listen = listen;
        }

        validate(&file_config)?;

        let token = token
            .map(BotToken::new)
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let timezone_name = file_config.display.timezone.trim();
        let timezone = timezone_name.parse::<Tz>().map_err(|_| {
            ConfigError::ValidationError(format!(
                "display.timezone: unknown time zone {timezone_name:?}"
            ))
        })?;

        Ok(LoadedConfig {
            source: SourceConfig {
                organization: file_config.source.organization.trim().to_string(),
                organization_uuid: file_config.source.organization_uuid,
            },
            discord: DiscordConfig {
                channel_id: file_config.discord.channel_id.trim().to_string(),
                token,
            },
            store_path: file_config.store.path,
            polling: PollingConfig {
                interval: Duration::from_secs(file_config.polling.interval_secs),
                fetch_timeout: Duration::from_secs(file_config.polling.fetch_timeout_secs),
                notify_timeout: Duration::from_secs(file_config.polling.notify_timeout_secs),
            },
            display: DisplayConfig::new(timezone),
            status: StatusConfig {
                enabled: file_config.status.enabled,
                listen: file_config.status.listen,
            },
            log_json: file_config.logging.json,
        })
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.source.organization.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "source.organization must not be empty".to_string(),
        ));
    }

    let channel_id = config.discord.channel_id.trim();
    if channel_id.is_empty() || !channel_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConfigError::ValidationError(format!(
            "discord.channel_id must be a numeric id, got {:?}",
            config.discord.channel_id
        )));
    }

    if config.store.path.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "store.path must not be empty".to_string(),
        ));
    }

    for (name, value) in [
        ("polling.interval_secs", config.polling.interval_secs),
        ("polling.fetch_timeout_secs", config.polling.fetch_timeout_secs),
        ("polling.notify_timeout_secs", config.polling.notify_timeout_secs),
    ] {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{name} must be greater than zero"
            )));
        }
    }

    Ok(())
}
