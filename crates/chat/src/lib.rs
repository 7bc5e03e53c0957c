//! Chat integration - the group's interface to the scheduler
//!
//! This crate provides the chat surface for readycheck:
//! - **Gateway** (`gateway`) - transport abstraction and event pump with
//!   reconnection
//! - **Commands** (`commands`) - `!available`, `!status`, prefix-abbreviated
//!   routing
//! - **Render** (`render`) - the status board and help text
//! - **Service** (`service`) - wires commands and announcements to the
//!   session coordinator
//!
//! # Architecture
//!
//! ```text
//! Chat Events → GatewayRunner → CommandRouter → ChatSessionService → Coordinator
//!                                                      ↓
//!                                    replies, reactions, announcements
//! ```
//!
//! # Key Types
//!
//! - `GatewayRunner` - event loop with backoff reconnection
//! - `ChatTransport` - what a concrete chat backend must provide
//! - `ChatSessionService` - command handlers bridging into the coordinator
//! - `TransportAnnouncer` / `ReactionVoteCollector` - coordinator
//!   capabilities backed by the transport

pub mod commands;
pub mod gateway;
pub mod render;
pub mod service;

pub use commands::{
    ChatMessageEvent, CommandParseError, CommandReply, CommandRouteError, CommandRouter,
    NoopSessionCommandService, SessionCommand, SessionCommandService,
};
pub use gateway::{
    ChatEvent, ChatTransport, GatewayRunner, MessageRef, NoopChatTransport, ReconnectPolicy,
    TransportError,
};
pub use service::{
    ChannelDirectory, ChatSessionService, ReactionVoteCollector, TransportAnnouncer,
    DEFAULT_CHANNEL_NAME,
};
