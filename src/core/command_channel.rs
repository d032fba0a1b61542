//! Inbound command channel.
//!
//! A persistent websocket to the hub: authenticate, subscribe to one event
//! type, then keep the latest on/off state it reports. The handshake itself
//! is a pure state machine ([`Handshake`]) so its ordering can be tested
//! without a socket; [`CommandChannel`] drives it over tokio-tungstenite and
//! reconnects with capped backoff.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use super::config::{ReconnectPolicy, Settings};
use super::error::{BridgeError, Result};

/// Correlation id of the single subscription request.
pub const SUBSCRIPTION_ID: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakePhase {
    #[default]
    Disconnected,
    Connecting,
    Authenticating,
    Subscribed,
    Failed,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    Auth { access_token: String },
    SubscribeEvents { id: u64, event_type: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventBody {
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    AuthOk,
    AuthInvalid {
        #[serde(default)]
        message: Option<String>,
    },
    Event {
        #[serde(default)]
        id: Option<u64>,
        event: EventBody,
    },
    #[serde(other)]
    Other,
}

/// What the driver must do after feeding a frame to the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeStep {
    Reply(OutboundFrame),
    /// New latest value from a matching event
    Value(bool),
    Ignore,
}

/// One connection attempt's worth of handshake state.
#[derive(Debug, Clone)]
pub struct Handshake {
    phase: HandshakePhase,
    token: String,
    event_type: String,
}

impl Handshake {
    pub fn new(token: &str, event_type: &str) -> Self {
        Self {
            phase: HandshakePhase::Disconnected,
            token: token.to_string(),
            event_type: event_type.to_string(),
        }
    }

    pub fn phase(&self) -> HandshakePhase {
        self.phase
    }

    pub fn begin_connect(&mut self) {
        self.phase = HandshakePhase::Connecting;
    }

    /// Transport is open; the auth frame must go out first.
    pub fn on_open(&mut self) -> OutboundFrame {
        self.phase = HandshakePhase::Authenticating;
        OutboundFrame::Auth {
            access_token: self.token.clone(),
        }
    }

    pub fn on_text(&mut self, text: &str) -> Result<HandshakeStep> {
        let frame: InboundFrame = serde_json::from_str(text).map_err(|e| BridgeError::Frame {
            details: e.to_string(),
        })?;

        match (self.phase, frame) {
            (HandshakePhase::Authenticating, InboundFrame::AuthOk) => {
                self.phase = HandshakePhase::Subscribed;
                Ok(HandshakeStep::Reply(OutboundFrame::SubscribeEvents {
                    id: SUBSCRIPTION_ID,
                    event_type: self.event_type.clone(),
                }))
            }
            (HandshakePhase::Authenticating, InboundFrame::AuthInvalid { message }) => {
                log::warn!(
                    "Hub rejected the access token: {}",
                    message.as_deref().unwrap_or("no reason given")
                );
                self.phase = HandshakePhase::Failed;
                Ok(HandshakeStep::Ignore)
            }
            (HandshakePhase::Subscribed, InboundFrame::Event { id, event }) => {
                if id.is_some_and(|id| id != SUBSCRIPTION_ID) {
                    return Ok(HandshakeStep::Ignore);
                }
                if event
                    .event_type
                    .as_deref()
                    .is_some_and(|event_type| event_type != self.event_type)
                {
                    return Ok(HandshakeStep::Ignore);
                }
                match event.data.state {
                    Some(state) => Ok(HandshakeStep::Value(state.eq_ignore_ascii_case("ON"))),
                    None => Err(BridgeError::Frame {
                        details: "event without data.state".to_string(),
                    }),
                }
            }
            _ => Ok(HandshakeStep::Ignore),
        }
    }

    pub fn on_closed(&mut self) {
        self.phase = HandshakePhase::Closed;
    }

    pub fn on_failed(&mut self) {
        self.phase = HandshakePhase::Failed;
    }
}

const VALUE_UNKNOWN: u8 = 0;
const VALUE_OFF: u8 = 1;
const VALUE_ON: u8 = 2;

/// Latest value and phase, readable from any thread.
#[derive(Debug, Default)]
pub struct ChannelState {
    latest: AtomicU8,
    phase: Mutex<HandshakePhase>,
}

impl ChannelState {
    pub fn latest_value(&self) -> Option<bool> {
        match self.latest.load(Ordering::Acquire) {
            VALUE_ON => Some(true),
            VALUE_OFF => Some(false),
            _ => None,
        }
    }

    pub fn phase(&self) -> HandshakePhase {
        match self.phase.lock() {
            Ok(phase) => *phase,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_latest(&self, on: bool) {
        let encoded = if on { VALUE_ON } else { VALUE_OFF };
        self.latest.store(encoded, Ordering::Release);
    }

    fn set_phase(&self, next: HandshakePhase) {
        let mut phase = match self.phase.lock() {
            Ok(phase) => phase,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *phase != next {
            log::info!("Command channel {:?} -> {:?}", *phase, next);
            *phase = next;
        }
    }
}

/// `http(s)://host` to `ws(s)://host/api/websocket`.
pub fn ws_url(base: &str) -> Option<String> {
    let base = base.trim().trim_end_matches('/');
    let host = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        return None;
    };
    Some(format!("{}/api/websocket", host))
}

fn encode(frame: &OutboundFrame) -> Result<Message> {
    let text = serde_json::to_string(frame).map_err(|e| BridgeError::Frame {
        details: e.to_string(),
    })?;
    Ok(Message::Text(text))
}

pub struct CommandChannel {
    url: String,
    token: String,
    event_type: String,
    reconnect: ReconnectPolicy,
    state: Arc<ChannelState>,
}

impl CommandChannel {
    pub fn new(
        url: String,
        token: String,
        event_type: String,
        reconnect: ReconnectPolicy,
        state: Arc<ChannelState>,
    ) -> Self {
        Self {
            url,
            token,
            event_type,
            reconnect,
            state,
        }
    }

    /// `None` when no usable hub url is configured.
    pub fn from_settings(settings: &Settings, state: Arc<ChannelState>) -> Option<Self> {
        let url = ws_url(&settings.ha_url)?;
        Some(Self::new(
            url,
            settings.ha_token.clone(),
            settings.command_event_type.clone(),
            settings.reconnect,
            state,
        ))
    }

    /// Connects and reconnects until the attempt budget runs out.
    pub async fn run(self) -> Result<()> {
        let mut attempt: u32 = 0;
        loop {
            let mut subscribed = false;
            match self.session(&mut subscribed).await {
                Ok(()) => log::info!("Command channel closed"),
                Err(e) => {
                    self.state.set_phase(HandshakePhase::Failed);
                    log::error!("Command channel failure: {}", e);
                }
            }
            if subscribed {
                attempt = 0;
            }

            if !self.reconnect.allows(attempt) {
                log::error!("Command channel giving up after {} reconnect attempts", attempt);
                return Ok(());
            }
            let delay = self.reconnect.delay_for(attempt);
            log::info!("Reconnecting command channel in {:?}", delay);
            tokio::time::sleep(delay).await;
            attempt = attempt.saturating_add(1);
        }
    }

    async fn session(&self, subscribed: &mut bool) -> Result<()> {
        let mut handshake = Handshake::new(&self.token, &self.event_type);
        handshake.begin_connect();
        self.state.set_phase(handshake.phase());

        let (stream, _) = connect_async(self.url.as_str()).await?;
        let (mut write, mut read) = stream.split();

        let auth = handshake.on_open();
        self.state.set_phase(handshake.phase());
        write.send(encode(&auth)?).await?;

        while let Some(message) = read.next().await {
            match message? {
                Message::Text(text) => match handshake.on_text(&text) {
                    Ok(HandshakeStep::Reply(frame)) => write.send(encode(&frame)?).await?,
                    Ok(HandshakeStep::Value(on)) => {
                        if self.state.latest_value() != Some(on) {
                            log::info!("Command state now {}", if on { "ON" } else { "OFF" });
                        }
                        self.state.set_latest(on);
                    }
                    Ok(HandshakeStep::Ignore) => {}
                    Err(e) => log::warn!("Ignoring command frame: {}", e),
                },
                Message::Ping(data) => write.send(Message::Pong(data)).await?,
                Message::Close(frame) => {
                    log::info!("Hub closed the command channel: {:?}", frame);
                    break;
                }
                _ => {}
            }

            self.state.set_phase(handshake.phase());
            if handshake.phase() == HandshakePhase::Subscribed {
                *subscribed = true;
            }
            if handshake.phase() == HandshakePhase::Failed {
                return Err(BridgeError::Frame {
                    details: "authentication rejected".to_string(),
                });
            }
        }

        handshake.on_closed();
        self.state.set_phase(handshake.phase());
        Ok(())
    }
}
