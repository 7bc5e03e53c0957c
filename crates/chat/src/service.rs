//! Bridges between the chat surface and the session coordinator: the
//! command handlers, and the transport-backed announce/vote capabilities
//! the coordinator runs on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use readycheck_core::{
    Announcer, ApplicationError, CapabilityError, Coordinator, ParticipantId, SessionClock, Tier,
    VoteCollector, VoteHandle,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::commands::{ChatMessageEvent, CommandReply, CommandRouteError, SessionCommandService};
use crate::gateway::{ChatTransport, MessageRef, TransportError};
use crate::render;

pub const DEFAULT_CHANNEL_NAME: &str = "readycheck";

/// Where announcements go. Starts from configuration, can be rebound at
/// runtime with the setup command, and provisions the default channel on
/// first use if nothing is bound.
pub struct ChannelDirectory {
    bound: Mutex<Option<String>>,
    default_name: String,
}

impl ChannelDirectory {
    pub fn new(configured: Option<String>, default_name: impl Into<String>) -> Self {
        Self { bound: Mutex::new(configured), default_name: default_name.into() }
    }

    pub async fn bind(&self, channel_id: impl Into<String>) {
        *self.bound.lock().await = Some(channel_id.into());
    }

    /// The announcement channel id, provisioning the default channel the
    /// first time nothing is bound.
    pub async fn resolve(&self, transport: &dyn ChatTransport) -> Result<String, TransportError> {
        let mut bound = self.bound.lock().await;
        if let Some(channel_id) = bound.as_ref() {
            return Ok(channel_id.clone());
        }
        let channel_id = transport.ensure_channel(&self.default_name).await?;
        info!(
            event_name = "egress.chat.channel_provisioned",
            channel = %channel_id,
            name = %self.default_name,
            "announcement channel provisioned"
        );
        *bound = Some(channel_id.clone());
        Ok(channel_id)
    }
}

/// [`Announcer`] that posts into the bound channel.
pub struct TransportAnnouncer {
    transport: Arc<dyn ChatTransport>,
    channels: Arc<ChannelDirectory>,
}

impl TransportAnnouncer {
    pub fn new(transport: Arc<dyn ChatTransport>, channels: Arc<ChannelDirectory>) -> Self {
        Self { transport, channels }
    }
}

#[async_trait]
impl Announcer for TransportAnnouncer {
    async fn announce(&self, text: &str) -> Result<(), CapabilityError> {
        let channel_id = self
            .channels
            .resolve(self.transport.as_ref())
            .await
            .map_err(|failure| CapabilityError::Announce(failure.to_string()))?;
        self.transport
            .send_message(&channel_id, text)
            .await
            .map(|_| ())
            .map_err(|failure| CapabilityError::Announce(failure.to_string()))
    }
}

/// [`VoteCollector`] that posts the prompt as a message and counts
/// thumbs-up style reactions on it.
pub struct ReactionVoteCollector {
    transport: Arc<dyn ChatTransport>,
    channels: Arc<ChannelDirectory>,
}

impl ReactionVoteCollector {
    pub fn new(transport: Arc<dyn ChatTransport>, channels: Arc<ChannelDirectory>) -> Self {
        Self { transport, channels }
    }
}

fn is_affirmative_reaction(reaction: &str) -> bool {
    let normalized = reaction.trim().trim_matches(':').to_lowercase();
    matches!(normalized.as_str(), "👍" | "thumbsup" | "thumbs_up" | "+1")
}

#[async_trait]
impl VoteCollector for ReactionVoteCollector {
    async fn request_vote(&self, text: &str) -> Result<VoteHandle, CapabilityError> {
        let channel_id = self
            .channels
            .resolve(self.transport.as_ref())
            .await
            .map_err(|failure| CapabilityError::VoteRequest(failure.to_string()))?;
        let posted = self
            .transport
            .send_message(&channel_id, text)
            .await
            .map_err(|failure| CapabilityError::VoteRequest(failure.to_string()))?;
        Ok(VoteHandle(format!("{}|{}", posted.channel_id, posted.message_ts)))
    }

    async fn tally(&self, handle: &VoteHandle) -> Result<u32, CapabilityError> {
        let Some((channel_id, message_ts)) = handle.0.split_once('|') else {
            return Err(CapabilityError::VoteTally("malformed vote handle".to_owned()));
        };
        let target = MessageRef {
            channel_id: channel_id.to_owned(),
            message_ts: message_ts.to_owned(),
        };
        let reactions = self
            .transport
            .reactions_on(&target)
            .await
            .map_err(|failure| CapabilityError::VoteTally(failure.to_string()))?;
        Ok(reactions.iter().filter(|reaction| is_affirmative_reaction(reaction)).count() as u32)
    }
}

/// The command handlers behind the router. Senders are identified by
/// their mention handle so announcements ping the right people.
pub struct ChatSessionService {
    coordinator: Coordinator,
    clock: SessionClock,
    channels: Arc<ChannelDirectory>,
    debug_echo: AtomicBool,
}

impl ChatSessionService {
    pub fn new(coordinator: Coordinator, clock: SessionClock, channels: Arc<ChannelDirectory>) -> Self {
        Self { coordinator, clock, channels, debug_echo: AtomicBool::new(false) }
    }

    fn sender(message: &ChatMessageEvent) -> ParticipantId {
        ParticipantId::from(message.sender_handle.as_str())
    }
}

#[async_trait]
impl SessionCommandService for ChatSessionService {
    async fn submit_availability(
        &self,
        message: &ChatMessageEvent,
        expression: &str,
    ) -> Result<CommandReply, CommandRouteError> {
        let now = self.clock.now();
        match self.coordinator.submit_availability(Self::sender(message), expression, now).await {
            Ok(outcome) => {
                if self.debug_echo.load(Ordering::Relaxed) {
                    let tier = match outcome.tier {
                        Tier::Selected => "selected",
                        Tier::Backup => "backup",
                    };
                    Ok(CommandReply::Text(format!(
                        "{} {} ({tier})",
                        message.sender_handle, outcome.window
                    )))
                } else {
                    Ok(CommandReply::React("👍"))
                }
            }
            Err(failure) => {
                debug!(
                    event_name = "session.availability.rejected",
                    participant = %message.sender_handle,
                    error = %failure,
                    "availability rejected"
                );
                Ok(CommandReply::Text(ApplicationError::from(failure).user_message()))
            }
        }
    }

    async fn withdraw_availability(
        &self,
        message: &ChatMessageEvent,
    ) -> Result<CommandReply, CommandRouteError> {
        let now = self.clock.now();
        match self.coordinator.withdraw_availability(&Self::sender(message), now).await {
            Ok(()) => Ok(CommandReply::React("👍")),
            Err(failure) => {
                Ok(CommandReply::Text(ApplicationError::from(failure).user_message()))
            }
        }
    }

    async fn quorum_size(
        &self,
        _message: &ChatMessageEvent,
        requested: Option<u32>,
    ) -> Result<CommandReply, CommandRouteError> {
        let Some(requested) = requested else {
            let current = self.coordinator.quorum_size().await;
            return Ok(CommandReply::Text(format!("looking for {current} players")));
        };
        let now = self.clock.now();
        match self.coordinator.set_quorum_size(requested, now).await {
            Ok(()) => Ok(CommandReply::Text(format!("now looking for {requested} players"))),
            Err(failure) => {
                Ok(CommandReply::Text(ApplicationError::from(failure).user_message()))
            }
        }
    }

    async fn status(&self, _message: &ChatMessageEvent) -> Result<CommandReply, CommandRouteError> {
        let report = self.coordinator.status(self.clock.now()).await;
        Ok(CommandReply::Text(render::status_board(&report)))
    }

    async fn bind_channel(
        &self,
        message: &ChatMessageEvent,
    ) -> Result<CommandReply, CommandRouteError> {
        self.channels.bind(message.channel_id.clone()).await;
        info!(
            event_name = "session.channel.bound",
            channel = %message.channel_id,
            "announcement channel rebound"
        );
        Ok(CommandReply::Text("session announcements will land here".to_owned()))
    }

    async fn set_debug(
        &self,
        _message: &ChatMessageEvent,
        enabled: bool,
    ) -> Result<CommandReply, CommandRouteError> {
        self.debug_echo.store(enabled, Ordering::Relaxed);
        let reply = if enabled { "debug echo on" } else { "debug echo off" };
        Ok(CommandReply::Text(reply.to_owned()))
    }
}
