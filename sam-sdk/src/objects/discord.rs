//! Discord REST and gateway payloads.
//!
//! Only the subset the announcer needs is modelled: message create/edit on
//! the REST side, and the identify/heartbeat/resume handshake on the gateway.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hard limit Discord enforces on `content`.
pub const MAX_CONTENT_CHARS: usize = 2000;

/// Body of `POST /channels/{id}/messages` and `PATCH /channels/{id}/messages/{id}`.
///
/// `embeds` is always serialized so that an edit can remove a previous image.
/// `allowed_mentions` is always serialized so that text copied from a listing
/// can never ping anyone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMessage {
    pub content: String,
    #[serde(default)]
    pub embeds: Vec<Embed>,
    #[serde(default)]
    pub allowed_mentions: AllowedMentions,
    /// At most [`MAX_NONCE_CHARS`] characters. Only meaningful on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// With a nonce set, Discord answers a repeated create with the message
    /// it already created instead of posting a second one.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub enforce_nonce: bool,
}

impl CreateMessage {
    /// Tag a create so that repeating it within Discord's nonce window
    /// returns the first message.
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        let mut nonce: String = nonce.into();
        if let Some((cut, _)) = nonce.char_indices().nth(MAX_NONCE_CHARS) {
            nonce.truncate(cut);
        }
        self.nonce = Some(nonce);
        self.enforce_nonce = true;
        self
    }

    /// The same body without the create-only nonce fields, for edits.
    pub fn for_edit(&self) -> Self {
        Self {
            nonce: None,
            enforce_nonce: false,
            ..self.clone()
        }
    }
}

/// Longest nonce Discord accepts.
pub const MAX_NONCE_CHARS: usize = 25;

/// Which mentions in `content` actually notify. The default parses none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedMentions {
    #[serde(default)]
    pub parse: Vec<String>,
}

impl AllowedMentions {
    pub fn none() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedMedia>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedMedia {
    pub url: String,
}

/// The part of a Discord message object the announcer reads back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
}

/// Error body returned by the REST API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiErrorBody {
    pub message: String,
    pub code: u32,
    /// Seconds to wait, present on 429 responses.
    pub retry_after: Option<f64>,
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Gateway opcodes.
pub struct Opcode;

impl Opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const PRESENCE_UPDATE: u8 = 3;
    pub const RESUME: u8 = 6;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Gateway intents.
pub struct Intents;

impl Intents {
    pub const GUILDS: u64 = 1;
}

/// Envelope of every gateway frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPayload {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayPayload {
    /// Build an outbound frame. Outbound frames never carry `s` or `t`.
    pub fn new(op: u8, d: impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self {
            op,
            d: serde_json::to_value(d)?,
            s: None,
            t: None,
        })
    }

    /// Heartbeat carrying the last sequence number seen (or `null`).
    pub fn heartbeat(sequence: Option<u64>) -> Self {
        Self {
            op: Opcode::HEARTBEAT,
            d: sequence.map(Value::from).unwrap_or(Value::Null),
            s: None,
            t: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hello {
    /// Milliseconds between heartbeats.
    pub heartbeat_interval: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Identify {
    pub token: String,
    pub intents: u64,
    pub properties: IdentifyProperties,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence: Option<PresenceUpdate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentifyProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Resume {
    pub token: String,
    pub session_id: String,
    pub seq: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceUpdate {
    pub since: Option<u64>,
    pub activities: Vec<Activity>,
    pub status: String,
    pub afk: bool,
}

impl PresenceUpdate {
    /// An online presence with a single "Listening to …" activity.
    pub fn listening(name: impl Into<String>) -> Self {
        Self {
            since: None,
            activities: vec![Activity {
                name: name.into(),
                kind: ActivityType::LISTENING,
            }],
            status: "online".to_string(),
            afk: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activity {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
}

pub struct ActivityType;

impl ActivityType {
    pub const LISTENING: u8 = 2;
}

/// The fields of the `READY` dispatch needed to resume a session later.
#[derive(Debug, Clone, Deserialize)]
pub struct Ready {
    pub session_id: String,
    pub resume_gateway_url: String,
    #[serde(default)]
    pub user: Option<ReadyUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadyUser {
    pub id: String,
    pub username: String,
}

/// Gateway close codes with special handling.
pub struct GatewayCloseCode;

impl GatewayCloseCode {
    pub const NOT_AUTHENTICATED: u16 = 4003;
    pub const AUTHENTICATION_FAILED: u16 = 4004;
    pub const INVALID_SEQ: u16 = 4007;
    pub const SESSION_TIMED_OUT: u16 = 4009;
    pub const INVALID_SHARD: u16 = 4010;
    pub const SHARDING_REQUIRED: u16 = 4011;
    pub const INVALID_API_VERSION: u16 = 4012;
    pub const INVALID_INTENTS: u16 = 4013;
    pub const DISALLOWED_INTENTS: u16 = 4014;

    /// Codes after which reconnecting cannot succeed without operator action.
    pub fn is_fatal(code: u16) -> bool {
        matches!(
            code,
            Self::AUTHENTICATION_FAILED
                | Self::INVALID_SHARD
                | Self::SHARDING_REQUIRED
                | Self::INVALID_API_VERSION
                | Self::INVALID_INTENTS
                | Self::DISALLOWED_INTENTS
        )
    }

    /// Whether the session can be resumed after this close code.
    pub fn is_resumable(code: u16) -> bool {
        !Self::is_fatal(code)
            && !matches!(
                code,
                Self::NOT_AUTHENTICATED | Self::INVALID_SEQ | Self::SESSION_TIMED_OUT
            )
    }
}
