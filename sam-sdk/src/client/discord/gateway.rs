//! Discord gateway connection.
//!
//! The gateway session runs in its own task. Callers hold a cheap
//! [`DiscordGateway`] handle and only ever observe its [`GatewayState`];
//! dropped connections are re-established (and resumed when possible)
//! with exponential backoff inside the task.
//!
//! # Session flow
//!
//! 1. Server sends HELLO with the heartbeat interval.
//! 2. We send IDENTIFY (fresh session) or RESUME (known session id).
//! 3. Server answers with the `READY` / `RESUMED` dispatch.
//! 4. We heartbeat every interval; a missing ACK means a zombie connection.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use super::BotToken;
use crate::objects::discord::{
    GatewayCloseCode, GatewayPayload, Hello, Identify, IdentifyProperties, Intents, Opcode,
    PresenceUpdate, Ready, Resume,
};

/// Default gateway endpoint (API v10, JSON encoding).
pub const DISCORD_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

const HELLO_TIMEOUT: Duration = Duration::from_secs(30);

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Externally visible connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    /// First connection attempt in progress.
    Connecting,
    /// Session identified (or resumed) and usable.
    Ready,
    /// Connection lost; the task is reconnecting.
    Reconnecting,
    /// The task has stopped (shutdown or fatal close code).
    Closed,
}

/// Errors surfaced by the gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Discord closed the session with a code reconnecting cannot fix.
    #[error("gateway closed the session with fatal code {code}: {reason}")]
    Fatal { code: u16, reason: String },

    /// The session did not become ready in time.
    #[error("gateway not ready after {0:?}")]
    NotReady(Duration),

    /// The gateway task has stopped.
    #[error("gateway is closed")]
    Closed,
}

/// Tunable parameters for the exponential-backoff reconnect strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay, clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Connection options.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub url: String,
    pub intents: u64,
    /// Presence announced in IDENTIFY.
    pub presence: Option<PresenceUpdate>,
    pub reconnect: ReconnectConfig,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            url: DISCORD_GATEWAY_URL.to_string(),
            intents: Intents::GUILDS,
            presence: None,
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Handle to a running gateway session.
#[derive(Clone)]
pub struct DiscordGateway {
    state_rx: watch::Receiver<GatewayState>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl DiscordGateway {
    /// Spawn the gateway task.
    ///
    /// The returned `JoinHandle` resolves to `Err(GatewayError::Fatal)` when
    /// Discord rejects the session for good, and to `Ok(())` after
    /// [`shutdown`](Self::shutdown).
    pub fn spawn(
        token: BotToken,
        options: GatewayOptions,
    ) -> (Self, JoinHandle<Result<(), GatewayError>>) {
        let (state_tx, state_rx) = watch::channel(GatewayState::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let session = GatewaySession {
            token,
            options,
            state_tx,
            shutdown_rx,
            sequence: None,
            resume: None,
        };
        let handle = tokio::spawn(session.run());

        (
            Self {
                state_rx,
                shutdown_tx: Arc::new(shutdown_tx),
            },
            handle,
        )
    }

    /// Current connection state.
    pub fn state(&self) -> GatewayState {
        *self.state_rx.borrow()
    }

    /// Wait until the session is ready, for at most `timeout`.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<(), GatewayError> {
        let mut state_rx = self.state_rx.clone();
        let wait = state_rx.wait_for(|s| matches!(s, GatewayState::Ready | GatewayState::Closed));

        match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(state)) => {
                if *state == GatewayState::Ready {
                    Ok(())
                } else {
                    Err(GatewayError::Closed)
                }
            }
            Ok(Err(_)) => Err(GatewayError::Closed),
            Err(_) => Err(GatewayError::NotReady(timeout)),
        }
    }

    /// Ask the gateway task to close the connection and stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

struct ResumeInfo {
    session_id: String,
    url: String,
}

enum SessionEnd {
    Shutdown,
    Reconnect { resumable: bool, was_ready: bool },
    Fatal { code: u16, reason: String },
}

struct GatewaySession {
    token: BotToken,
    options: GatewayOptions,
    state_tx: watch::Sender<GatewayState>,
    shutdown_rx: watch::Receiver<bool>,
    sequence: Option<u64>,
    resume: Option<ResumeInfo>,
}

impl GatewaySession {
    async fn run(mut self) -> Result<(), GatewayError> {
        let mut delay = self.options.reconnect.initial_delay;

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            let url = match &self.resume {
                Some(resume) => resume_url(&resume.url),
                None => self.options.url.clone(),
            };
            debug!(resuming = self.resume.is_some(), "Connecting to Discord gateway");

            match connect_async(url.as_str()).await {
                Ok((ws_stream, _response)) => match self.run_session(ws_stream).await {
                    SessionEnd::Shutdown => break,
                    SessionEnd::Fatal { code, reason } => {
                        error!(code, reason = %reason, "Discord gateway rejected the session");
                        self.state_tx.send_replace(GatewayState::Closed);
                        return Err(GatewayError::Fatal { code, reason });
                    }
                    SessionEnd::Reconnect {
                        resumable,
                        was_ready,
                    } => {
                        if !resumable {
                            self.resume = None;
                            self.sequence = None;
                        }
                        if was_ready {
                            delay = self.options.reconnect.initial_delay;
                        }
                        warn!(resumable, "Discord gateway session ended, reconnecting");
                    }
                },
                Err(e) => {
                    warn!(error = %e, "Discord gateway connection failed");
                }
            }

            self.state_tx.send_replace(GatewayState::Reconnecting);

            tokio::select! {
                biased;

                res = self.shutdown_rx.changed() => {
                    if res.is_err() || *self.shutdown_rx.borrow() {
                        break;
                    }
                }

                _ = tokio::time::sleep(delay) => {}
            }

            delay = next_delay(delay, &self.options.reconnect);
        }

        self.state_tx.send_replace(GatewayState::Closed);
        info!("Discord gateway stopped");
        Ok(())
    }

    /// Drive one websocket connection until it ends.
    async fn run_session(&mut self, ws_stream: WsStream) -> SessionEnd {
        let (mut sink, mut stream) = ws_stream.split();

        let hello = match read_hello(&mut stream).await {
            Ok(hello) => hello,
            Err(reason) => {
                warn!(reason = %reason, "Discord gateway handshake failed");
                return SessionEnd::Reconnect {
                    resumable: true,
                    was_ready: false,
                };
            }
        };

        let handshake = match self.handshake() {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "Failed to build gateway handshake");
                return SessionEnd::Reconnect {
                    resumable: false,
                    was_ready: false,
                };
            }
        };
        if let Err(e) = send_payload(&mut sink, &handshake).await {
            warn!(error = %e, "Failed to send gateway handshake");
            return SessionEnd::Reconnect {
                resumable: true,
                was_ready: false,
            };
        }

        // First beat is jittered so that many clients restarting at once do
        // not heartbeat in lockstep.
        let period = Duration::from_millis(hello.heartbeat_interval.max(1));
        let jitter = period.mul_f64(rand::random::<f64>());
        let mut heartbeat = tokio::time::interval_at(Instant::now() + jitter, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut awaiting_ack = false;
        let mut was_ready = false;

        loop {
            tokio::select! {
                biased;

                res = self.shutdown_rx.changed() => {
                    if res.is_err() || *self.shutdown_rx.borrow() {
                        let _ = sink.send(WsMessage::Close(None)).await;
                        return SessionEnd::Shutdown;
                    }
                }

                _ = heartbeat.tick() => {
                    if awaiting_ack {
                        warn!("Gateway heartbeat was not acknowledged, reconnecting");
                        return SessionEnd::Reconnect { resumable: true, was_ready };
                    }
                    let beat = GatewayPayload::heartbeat(self.sequence);
                    if let Err(e) = send_payload(&mut sink, &beat).await {
                        warn!(error = %e, "Failed to send gateway heartbeat");
                        return SessionEnd::Reconnect { resumable: true, was_ready };
                    }
                    awaiting_ack = true;
                }

                msg = stream.next() => match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        let payload: GatewayPayload = match serde_json::from_str(&text) {
                            Ok(payload) => payload,
                            Err(e) => {
                                warn!(error = %e, "Malformed gateway frame");
                                continue;
                            }
                        };
                        if let Some(seq) = payload.s {
                            self.sequence = Some(seq);
                        }

                        match payload.op {
                            Opcode::DISPATCH => {
                                if self.handle_dispatch(payload) {
                                    was_ready = true;
                                }
                            }
                            Opcode::HEARTBEAT => {
                                let beat = GatewayPayload::heartbeat(self.sequence);
                                if let Err(e) = send_payload(&mut sink, &beat).await {
                                    warn!(error = %e, "Failed to answer heartbeat request");
                                    return SessionEnd::Reconnect { resumable: true, was_ready };
                                }
                            }
                            Opcode::HEARTBEAT_ACK => awaiting_ack = false,
                            Opcode::RECONNECT => {
                                info!("Discord requested a gateway reconnect");
                                return SessionEnd::Reconnect { resumable: true, was_ready };
                            }
                            Opcode::INVALID_SESSION => {
                                let resumable = payload.d.as_bool().unwrap_or(false);
                                warn!(resumable, "Discord invalidated the gateway session");
                                return SessionEnd::Reconnect { resumable, was_ready };
                            }
                            op => debug!(op, "Ignoring gateway opcode"),
                        }
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.to_string()))
                            .unwrap_or((1005, String::new()));
                        if GatewayCloseCode::is_fatal(code) {
                            return SessionEnd::Fatal { code, reason };
                        }
                        info!(code, reason = %reason, "Discord closed the gateway connection");
                        return SessionEnd::Reconnect {
                            resumable: GatewayCloseCode::is_resumable(code),
                            was_ready,
                        };
                    }
                    Some(Ok(_)) => {
                        // Ping/Pong are answered by tungstenite, binary frames are unused.
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Gateway receive error");
                        return SessionEnd::Reconnect { resumable: true, was_ready };
                    }
                    None => {
                        warn!("Gateway stream exhausted");
                        return SessionEnd::Reconnect { resumable: true, was_ready };
                    }
                }
            }
        }
    }

    /// IDENTIFY for a fresh session, RESUME when a session id is known.
    fn handshake(&self) -> Result<GatewayPayload, serde_json::Error> {
        match &self.resume {
            Some(resume) => GatewayPayload::new(
                Opcode::RESUME,
                Resume {
                    token: self.token.expose().to_string(),
                    session_id: resume.session_id.clone(),
                    seq: self.sequence,
                },
            ),
            None => GatewayPayload::new(
                Opcode::IDENTIFY,
                Identify {
                    token: self.token.expose().to_string(),
                    intents: self.options.intents,
                    properties: IdentifyProperties {
                        os: std::env::consts::OS.to_string(),
                        browser: "sam".to_string(),
                        device: "sam".to_string(),
                    },
                    presence: self.options.presence.clone(),
                },
            ),
        }
    }

    /// Returns `true` when the dispatch made the session ready.
    fn handle_dispatch(&mut self, payload: GatewayPayload) -> bool {
        match payload.t.as_deref() {
            Some("READY") => match serde_json::from_value::<Ready>(payload.d) {
                Ok(ready) => {
                    info!(
                        user = ready.user.as_ref().map(|u| u.username.as_str()).unwrap_or("?"),
                        user_id = ready.user.as_ref().map(|u| u.id.as_str()).unwrap_or("?"),
                        "Discord gateway ready"
                    );
                    self.resume = Some(ResumeInfo {
                        session_id: ready.session_id,
                        url: ready.resume_gateway_url,
                    });
                    self.state_tx.send_replace(GatewayState::Ready);
                    true
                }
                Err(e) => {
                    warn!(error = %e, "Malformed READY dispatch");
                    false
                }
            },
            Some("RESUMED") => {
                info!("Discord gateway session resumed");
                self.state_tx.send_replace(GatewayState::Ready);
                true
            }
            _ => false,
        }
    }
}

fn resume_url(base: &str) -> String {
    format!("{}/?v=10&encoding=json", base.trim_end_matches('/'))
}

async fn read_hello<S>(stream: &mut S) -> Result<Hello, String>
where
    S: StreamExt<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let next = tokio::time::timeout(HELLO_TIMEOUT, stream.next())
            .await
            .map_err(|_| "timed out waiting for HELLO".to_string())?;

        match next {
            Some(Ok(WsMessage::Text(text))) => {
                let payload: GatewayPayload =
                    serde_json::from_str(&text).map_err(|e| e.to_string())?;
                if payload.op != Opcode::HELLO {
                    return Err(format!("expected HELLO, got opcode {}", payload.op));
                }
                return serde_json::from_value(payload.d).map_err(|e| e.to_string());
            }
            Some(Ok(WsMessage::Close(frame))) => {
                return Err(format!("closed before HELLO: {frame:?}"));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.to_string()),
            None => return Err("stream ended before HELLO".to_string()),
        }
    }
}

async fn send_payload<S>(sink: &mut S, payload: &GatewayPayload) -> Result<(), String>
where
    S: SinkExt<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let json = serde_json::to_string(payload).map_err(|e| e.to_string())?;
    sink.send(WsMessage::Text(json)).await.map_err(|e| e.to_string())
}
