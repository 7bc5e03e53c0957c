//! Transport seam and the event pump. [`ChatTransport`] hides whichever
//! chat backend is wired in; [`GatewayRunner`] owns the receive loop and
//! reconnects with capped exponential backoff when the connection drops.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::commands::{ChatMessageEvent, CommandReply, CommandRouter, SessionCommandService};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport connect failed: {0}")]
    Connect(String),

    #[error("transport receive failed: {0}")]
    Receive(String),

    #[error("transport send failed: {0}")]
    Send(String),

    #[error("transport reaction failed: {0}")]
    React(String),

    #[error("transport query failed: {0}")]
    Query(String),

    #[error("channel provisioning failed: {0}")]
    Provision(String),

    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

/// Address of a single posted message, enough to react to it or read the
/// reactions on it later.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageRef {
    pub channel_id: String,
    pub message_ts: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    MessagePosted(ChatMessageEvent),
    Unsupported { event_type: String },
}

/// The full surface the bot needs from a chat backend. `next_event`
/// returns `Ok(None)` on a clean close.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;

    async fn next_event(&self) -> Result<Option<ChatEvent>, TransportError>;

    async fn send_message(&self, channel_id: &str, text: &str)
        -> Result<MessageRef, TransportError>;

    async fn add_reaction(&self, message: &MessageRef, reaction: &str)
        -> Result<(), TransportError>;

    async fn reactions_on(&self, message: &MessageRef) -> Result<Vec<String>, TransportError>;

    /// Find or create the named channel, returning its id.
    async fn ensure_channel(&self, name: &str) -> Result<String, TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Transport that connects to nothing and immediately closes. Keeps the
/// wiring honest in tests and in offline bring-up.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopChatTransport;

#[async_trait]
impl ChatTransport for NoopChatTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_event(&self) -> Result<Option<ChatEvent>, TransportError> {
        Ok(None)
    }

    async fn send_message(
        &self,
        _channel_id: &str,
        _text: &str,
    ) -> Result<MessageRef, TransportError> {
        Err(TransportError::Send("noop transport".to_owned()))
    }

    async fn add_reaction(
        &self,
        _message: &MessageRef,
        _reaction: &str,
    ) -> Result<(), TransportError> {
        Err(TransportError::React("noop transport".to_owned()))
    }

    async fn reactions_on(&self, _message: &MessageRef) -> Result<Vec<String>, TransportError> {
        Ok(Vec::new())
    }

    async fn ensure_channel(&self, name: &str) -> Result<String, TransportError> {
        Ok(format!("noop-{name}"))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Backoff schedule for reconnects. Delays double per attempt and cap at
/// `max_delay_ms`.
#[derive(Clone, Copy, Debug)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let multiplier = 1u64 << attempt.min(16);
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Owns the connect/receive/dispatch loop. One runner per transport.
pub struct GatewayRunner<S> {
    transport: Arc<dyn ChatTransport>,
    router: CommandRouter<S>,
    policy: ReconnectPolicy,
}

impl<S: SessionCommandService> GatewayRunner<S> {
    pub fn new(transport: Arc<dyn ChatTransport>, router: CommandRouter<S>) -> Self {
        Self::with_policy(transport, router, ReconnectPolicy::default())
    }

    pub fn with_policy(
        transport: Arc<dyn ChatTransport>,
        router: CommandRouter<S>,
        policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, router, policy }
    }

    /// Pump events until the transport closes cleanly; reconnect on
    /// failure until the retry budget runs out.
    pub async fn start(&self) -> anyhow::Result<()> {
        let mut attempt: u32 = 0;
        loop {
            match self.connect_and_pump().await {
                Ok(()) => {
                    info!(event_name = "ingress.chat.closed", "transport closed cleanly");
                    attempt = 0;
                    tokio::time::sleep(Duration::from_millis(self.policy.base_delay_ms)).await;
                }
                Err(transport_failure) => {
                    attempt += 1;
                    if attempt > self.policy.max_retries {
                        error!(
                            event_name = "ingress.chat.gave_up",
                            attempts = attempt,
                            error = %transport_failure,
                            "out of reconnect attempts"
                        );
                        return Err(anyhow::anyhow!(
                            "chat transport failed after {attempt} attempts: {transport_failure}"
                        ));
                    }
                    let delay = self.policy.backoff_delay(attempt - 1);
                    warn!(
                        event_name = "ingress.chat.reconnect",
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %transport_failure,
                        "transport dropped, reconnecting"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn connect_and_pump(&self) -> Result<(), TransportError> {
        self.transport.connect().await?;
        info!(event_name = "ingress.chat.connected", "transport connected");
        loop {
            match self.transport.next_event().await? {
                Some(ChatEvent::MessagePosted(message)) => self.handle_message(&message).await,
                Some(ChatEvent::Unsupported { event_type }) => {
                    debug!(event_name = "ingress.chat.ignored", event_type, "unsupported event");
                }
                None => return Ok(()),
            }
        }
    }

    async fn handle_message(&self, message: &ChatMessageEvent) {
        debug!(
            event_name = "ingress.chat.message",
            channel = %message.channel_id,
            sender = %message.sender_handle,
            "message received"
        );
        let Some(outcome) = self.router.route(message).await else { return };
        let reply = match outcome {
            Ok(reply) => reply,
            Err(route_failure) => {
                warn!(
                    event_name = "ingress.chat.command_failed",
                    error = %route_failure,
                    "command handler failed"
                );
                CommandReply::Text("failed to parse command. sorry.".to_owned())
            }
        };
        self.deliver(message, reply).await;
    }

    async fn deliver(&self, message: &ChatMessageEvent, reply: CommandReply) {
        let delivery = match reply {
            CommandReply::Silent => return,
            CommandReply::Text(text) => {
                self.transport.send_message(&message.channel_id, &text).await.map(|_| ())
            }
            CommandReply::React(reaction) => {
                let target = MessageRef {
                    channel_id: message.channel_id.clone(),
                    message_ts: message.message_ts.clone(),
                };
                self.transport.add_reaction(&target, reaction).await
            }
        };
        if let Err(send_failure) = delivery {
            warn!(
                event_name = "egress.chat.reply_failed",
                error = %send_failure,
                "could not deliver reply"
            );
        }
    }
}
