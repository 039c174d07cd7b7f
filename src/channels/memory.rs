//! In-process channel: messages are pushed in by hand and replies are
//! recorded. Used by tests and for embedding the bot in another program.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::channels::{Channel, IncomingMessage, MessageStream};
use crate::error::ChannelError;

/// A reply captured by [`MemoryChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub user_id: String,
    pub text: String,
}

pub struct MemoryChannel {
    inbound_tx: mpsc::UnboundedSender<IncomingMessage>,
    inbound_rx: Mutex<Option<mpsc::UnboundedReceiver<IncomingMessage>>>,
    sent: Mutex<Vec<SentMessage>>,
    fail_sends: AtomicBool,
}

impl MemoryChannel {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            inbound_tx,
            inbound_rx: Mutex::new(Some(inbound_rx)),
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
        }
    }

    /// Queue an inbound message for the stream returned by `start`.
    pub fn push(&self, msg: IncomingMessage) {
        let _ = self.inbound_tx.send(msg);
    }

    /// Make sends fail (or succeed again).
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Every message delivered so far, in order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Texts delivered to one user.
    pub fn sent_to(&self, user_id: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.text)
            .collect()
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    fn name(&self) -> &str {
        "memory"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let rx = self
            .inbound_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| ChannelError::StartupFailed {
                name: "memory".into(),
                reason: "already started".into(),
            })?;

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });
        Ok(Box::pin(stream))
    }

    async fn send(&self, user_id: &str, text: &str) -> Result<(), ChannelError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ChannelError::SendFailed {
                name: "memory".into(),
                reason: "simulated failure".into(),
            });
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentMessage {
                user_id: user_id.to_string(),
                text: text.to_string(),
            });
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
