//! The bot: routes each inbound message to commands, onboarding or the
//! reply generator, and runs the receive loop.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::channels::{Channel, IncomingMessage};
use crate::clock::Clock;
use crate::commands::CommandRouter;
use crate::config::BotConfig;
use crate::error::ChannelError;
use crate::interactions::{InteractionKind, InteractionLog};
use crate::llm::{GenerationContext, Responder};
use crate::messages;
use crate::onboarding::{AnswerOutcome, OnboardingManager};
use crate::store::UserStore;

const HANDLER_FAILED_REPLY: &str = "Oops, something went wrong on my side. Please try again! 🙏";

pub struct Bot {
    bot_name: String,
    shutdown_drain: Duration,
    store: Arc<UserStore>,
    channel: Arc<dyn Channel>,
    clock: Arc<dyn Clock>,
    onboarding: OnboardingManager,
    commands: CommandRouter,
    responder: Responder,
    log: InteractionLog,
    ready: Arc<AtomicBool>,
}

impl Bot {
    pub fn new(
        config: &BotConfig,
        store: Arc<UserStore>,
        channel: Arc<dyn Channel>,
        clock: Arc<dyn Clock>,
        responder: Responder,
        log: InteractionLog,
    ) -> Self {
        let hours = (
            config.reminders.business_hours_start,
            config.reminders.business_hours_end,
        );
        Self {
            bot_name: config.bot_name.clone(),
            shutdown_drain: config.shutdown_drain,
            onboarding: OnboardingManager::new(store.clone(), clock.clone(), hours),
            commands: CommandRouter::new(store.clone(), clock.clone(), log.clone()),
            store,
            channel,
            clock,
            responder,
            log,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True while the receive loop is connected.
    pub fn ready_flag(&self) -> Arc<AtomicBool> {
        self.ready.clone()
    }

    /// Replies for one inbound message, in sending order.
    pub async fn handle_message(&self, msg: &IncomingMessage) -> Vec<String> {
        if !msg.is_direct() {
            debug!(channel = %msg.channel, sender = %msg.sender_id, "Ignoring non-direct message");
            return Vec::new();
        }
        let body = msg.body.trim();
        if body.is_empty() {
            return Vec::new();
        }

        let user_id = msg.sender_id.as_str();
        self.log.append(user_id, InteractionKind::Message, body);

        if let Some(replies) = self.commands.route(user_id, &msg.sender_name, body).await {
            return replies;
        }

        let (record, created) = self
            .store
            .get_or_create(user_id, &msg.sender_name, self.clock.now())
            .await;
        if created {
            return vec![
                messages::welcome(&record.name, &self.bot_name),
                messages::questionnaire_start(&record.name),
            ];
        }

        if !record.is_idle() {
            let outcome = self.onboarding.handle_answer(user_id, body).await;
            if outcome != AnswerOutcome::NotPending {
                return outcome.replies();
            }
        }

        let context = GenerationContext::new(record.name, record.water_goal);
        vec![self.responder.reply(body, &context).await]
    }

    /// Handle one message and send the replies. Never panics outward.
    pub async fn respond(&self, msg: IncomingMessage) {
        let replies = match AssertUnwindSafe(self.handle_message(&msg))
            .catch_unwind()
            .await
        {
            Ok(replies) => replies,
            Err(_) => {
                error!(user_id = %msg.sender_id, "Message handler panicked");
                vec![HANDLER_FAILED_REPLY.to_string()]
            }
        };

        for reply in replies {
            if let Err(e) = self.channel.send(&msg.sender_id, &reply).await {
                warn!(user_id = %msg.sender_id, error = %e, "Failed to send reply");
                break;
            }
        }
    }

    /// Receive and handle messages until the stream ends or `shutdown`
    /// flips. Each message runs in its own task; in-flight tasks get the
    /// configured drain time before being abandoned.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Result<(), ChannelError> {
        let mut stream = self.channel.start().await?;
        self.ready.store(true, Ordering::SeqCst);
        info!(channel = self.channel.name(), "Bot is ready");

        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                next = stream.next() => {
                    let Some(msg) = next else {
                        info!("Inbound stream ended");
                        break;
                    };
                    let bot = self.clone();
                    tasks.spawn(async move { bot.respond(msg).await });
                }
            }
            while tasks.try_join_next().is_some() {}
        }

        self.ready.store(false, Ordering::SeqCst);

        let pending = tasks.len();
        if pending > 0 {
            info!(pending, "Waiting for in-flight messages");
            let drained = tokio::time::timeout(self.shutdown_drain, async {
                while tasks.join_next().await.is_some() {}
            })
            .await;
            if drained.is_err() {
                warn!(remaining = tasks.len(), "Drain timed out, abandoning messages");
                tasks.abort_all();
            }
        }
        Ok(())
    }
}
