//! Notifier: announces new and updated events in the chat channel.
//!
//! `DiscordNotifier` posts through the REST API and waits for the gateway
//! session (when one is attached) before delivering. Transient failures
//! (network, 5xx, 429) are retried a few times with exponential backoff,
//! within the notification's time budget; everything else surfaces
//! immediately.
//!
//! Every create carries a nonce derived from the event id and fingerprint,
//! with `enforce_nonce` set. A create that timed out on our side but reached
//! Discord is answered with the already posted message when it is repeated,
//! so a retry never posts the same announcement twice.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use sam_sdk::client::{ClientError, DiscordGateway, DiscordRest, GatewayError};
use sam_sdk::objects::discord::{CreateMessage, Message};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::DisplayConfig;
use crate::listing::{ChangeKind, Delivery, Event};
use crate::utils::fingerprint::delivery_nonce;
use crate::utils::message::render_message;

/// Attempts per notification, the first one included.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Upper bound for a server-requested rate-limit wait.
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(30);

/// How long a notification waits for the gateway session by default.
pub const DEFAULT_GATEWAY_WAIT: Duration = Duration::from_secs(10);

/// Errors that can occur during delivery.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The gateway session is not ready (reconnecting or closed).
    #[error("gateway unavailable: {0}")]
    GatewayUnavailable(#[from] GatewayError),

    /// Discord refused the message (4xx other than 404/429).
    #[error("message rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Transient failures persisted through every attempt.
    #[error("delivery failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },

    /// The request could not be built or the answer not read.
    #[error("client error: {0}")]
    Client(ClientError),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver exactly one chat message announcing `event`.
    async fn notify(&self, event: &Event, kind: ChangeKind) -> Result<Delivery, DeliveryError>;
}

/// [`Notifier`] posting to one Discord channel.
pub struct DiscordNotifier {
    rest: DiscordRest,
    channel_id: String,
    gateway: Option<DiscordGateway>,
    gateway_wait: Duration,
    display: DisplayConfig,
    /// Time one `notify` call may spend, gateway wait and retries included.
    budget: Option<Duration>,
}

impl DiscordNotifier {
    pub fn new(rest: DiscordRest, channel_id: impl Into<String>, display: DisplayConfig) -> Self {
        Self {
            rest,
            channel_id: channel_id.into(),
            gateway: None,
            gateway_wait: DEFAULT_GATEWAY_WAIT,
            display,
            budget: None,
        }
    }

    /// Stop retrying once another attempt could not finish within `budget`.
    ///
    /// Set this to the caller's timeout so that retries are never cut off
    /// halfway by it.
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Require `gateway` to be ready before each delivery, waiting up to `wait`.
    pub fn with_gateway(mut self, gateway: DiscordGateway, wait: Duration) -> Self {
        self.gateway = Some(gateway);
        self.gateway_wait = wait;
        self
    }

    async fn deliver_once(
        &self,
        message: &CreateMessage,
        kind: &ChangeKind,
    ) -> Result<Message, ClientError> {
        if let ChangeKind::Updated {
            previous_message: Some(previous),
        } = kind
        {
            match self
                .rest
                .edit_message(&self.channel_id, previous, &message.for_edit())
                .await
            {
                Err(ClientError::Api { status, .. }) if status == StatusCode::NOT_FOUND => {
                    info!(
                        message_id = %previous,
                        "Previous announcement is gone, posting a new one"
                    );
                }
                other => return other,
            }
        }
        self.rest.create_message(&self.channel_id, message).await
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, event: &Event, kind: ChangeKind) -> Result<Delivery, DeliveryError> {
        let deadline = self.budget.map(|budget| Instant::now() + budget);

        if let Some(gateway) = &self.gateway {
            let wait = match deadline {
                Some(deadline) => self
                    .gateway_wait
                    .min(deadline.saturating_duration_since(Instant::now())),
                None => self.gateway_wait,
            };
            gateway.wait_ready(wait).await?;
        }

        let nonce = delivery_nonce(&event.id, &event.fingerprint());
        let message = render_message(event, &kind, &self.display).with_nonce(nonce);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.deliver_once(&message, &kind).await {
                Ok(sent) => {
                    debug!(
                        event_id = %event.id,
                        message_id = %sent.id,
                        attempt,
                        "Message delivered"
                    );
                    return Ok(Delivery {
                        message_id: sent.id,
                    });
                }
                Err(e) if e.is_transient() => {
                    let delay = match &e {
                        ClientError::RateLimited { retry_after } => {
                            Duration::try_from_secs_f64(*retry_after)
                                .unwrap_or(MAX_RATE_LIMIT_WAIT)
                                .min(MAX_RATE_LIMIT_WAIT)
                        }
                        _ => calculate_retry_delay(attempt - 1),
                    };
                    let out_of_time =
                        deadline.is_some_and(|deadline| Instant::now() + delay >= deadline);
                    if attempt >= MAX_DELIVERY_ATTEMPTS || out_of_time {
                        return Err(DeliveryError::Exhausted {
                            attempts: attempt,
                            last: e.to_string(),
                        });
                    }
                    warn!(
                        event_id = %event.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient delivery failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(ClientError::Api { status, body }) => {
                    return Err(DeliveryError::Rejected {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(e) => return Err(DeliveryError::Client(e)),
            }
        }
    }
}

/// Maximum backoff exponent (2^3 = 8 seconds).
const MAX_RETRY_EXPONENT: u32 = 3;

/// Calculate the delay before the next attempt.
///
/// Uses exponential backoff: 2^retry_count seconds.
pub fn calculate_retry_delay(retry_count: u32) -> Duration {
    Duration::from_secs(2u64.pow(retry_count.min(MAX_RETRY_EXPONENT)))
}
