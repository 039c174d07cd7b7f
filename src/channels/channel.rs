//! The `Channel` trait and the inbound message type every transport produces.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChannelError;

/// A message received from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Name of the channel that produced it.
    pub channel: String,
    /// Transport-level address of the sender; also where replies go.
    pub sender_id: String,
    /// Display name, possibly empty.
    pub sender_name: String,
    pub body: String,
    pub is_group: bool,
    /// Sent by this bot (or another bot account).
    pub is_self: bool,
    /// Status or broadcast-list traffic.
    pub is_broadcast: bool,
}

impl IncomingMessage {
    pub fn new(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            sender_id: sender_id.into(),
            sender_name: String::new(),
            body: body.into(),
            is_group: false,
            is_self: false,
            is_broadcast: false,
        }
    }

    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = name.into();
        self
    }

    pub fn in_group(mut self) -> Self {
        self.is_group = true;
        self
    }

    pub fn from_self(mut self) -> Self {
        self.is_self = true;
        self
    }

    pub fn as_broadcast(mut self) -> Self {
        self.is_broadcast = true;
        self
    }

    /// One-to-one traffic from someone else: the only kind the bot answers.
    pub fn is_direct(&self) -> bool {
        !self.is_group && !self.is_self && !self.is_broadcast
    }
}

/// Inbound messages; ends when the transport stops.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A chat transport.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Begin receiving. Called once.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Deliver `text` to `user_id`.
    async fn send(&self, user_id: &str, text: &str) -> Result<(), ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
