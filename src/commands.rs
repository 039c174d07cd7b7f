//! Slash-command routing.
//!
//! Commands are matched by prefix against an ordered table; the first token
//! that the normalized input starts with wins. Every command is checked
//! before onboarding answers, so `/reset` works from any step.

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::limits;
use crate::interactions::{InteractionKind, InteractionLog};
use crate::messages;
use crate::onboarding::model::UserRecord;
use crate::onboarding::state::Step;
use crate::store::UserStore;

/// Number of days `/history` shows.
const HISTORY_DAYS: usize = 7;

/// A recognized command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Resume,
    Status,
    Help,
    SetGoal,
    SetInterval,
    History,
    Reset,
}

impl Command {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Start => "set up your profile",
            Self::Stop => "pause reminders",
            Self::Resume => "turn reminders back on",
            Self::Status => "show your profile",
            Self::Help => "show this list",
            Self::SetGoal => "change your daily goal",
            Self::SetInterval => "change how often reminders come",
            Self::History => "show your last days",
            Self::Reset => "delete your data and start over",
        }
    }
}

/// Dispatch table. Order matters: no token may start with an earlier one.
pub const COMMANDS: &[(&str, Command)] = &[
    ("/start", Command::Start),
    ("/stop", Command::Stop),
    ("/pause", Command::Stop),
    ("/resume", Command::Resume),
    ("/status", Command::Status),
    ("/help", Command::Help),
    ("/goal", Command::SetGoal),
    ("/interval", Command::SetInterval),
    ("/history", Command::History),
    ("/reset", Command::Reset),
];

/// Match `text` against the table. Returns the matched token too.
pub fn parse(text: &str) -> Option<(&'static str, Command)> {
    let lower = text.trim().to_lowercase();
    COMMANDS
        .iter()
        .find(|(token, _)| lower.starts_with(token))
        .copied()
}

fn help_text() -> String {
    let mut text = String::from("💧 *Commands*\n\n");
    for (token, command) in COMMANDS {
        text.push_str(&format!("{token}: {}\n", command.description()));
    }
    text
}

const NOT_REGISTERED: &str = "You're not registered yet. Send /start to begin! 💧";

/// Executes commands against the user store.
pub struct CommandRouter {
    store: Arc<UserStore>,
    clock: Arc<dyn Clock>,
    log: InteractionLog,
}

impl CommandRouter {
    pub fn new(store: Arc<UserStore>, clock: Arc<dyn Clock>, log: InteractionLog) -> Self {
        Self { store, clock, log }
    }

    /// Run `text` as a command if it is one. `None` means "not a command".
    pub async fn route(&self, user_id: &str, sender_name: &str, text: &str) -> Option<Vec<String>> {
        let (token, command) = parse(text)?;
        tracing::debug!(user_id = %user_id, token, "Command received");

        let replies = self.execute(command, user_id, sender_name).await;
        self.log.append(user_id, InteractionKind::Command, token);
        Some(replies)
    }

    pub async fn execute(&self, command: Command, user_id: &str, sender_name: &str) -> Vec<String> {
        match command {
            Command::Start => self.start(user_id, sender_name).await,
            Command::Stop => self.stop(user_id).await,
            Command::Resume => self.resume(user_id).await,
            Command::Status => match self.store.get(user_id).await {
                Some(record) => vec![messages::status(&record)],
                None => vec![NOT_REGISTERED.to_string()],
            },
            Command::Help => vec![help_text()],
            Command::SetGoal => {
                self.begin_edit(
                    user_id,
                    Step::AwaitingNewGoal,
                    format!(
                        "What's your new daily goal in liters? (between {} and {})",
                        limits::MIN_WATER_GOAL_LITERS,
                        limits::MAX_WATER_GOAL_LITERS
                    ),
                )
                .await
            }
            Command::SetInterval => {
                self.begin_edit(
                    user_id,
                    Step::AwaitingNewInterval,
                    format!(
                        "How often, in minutes, should I remind you? (between {} and {})",
                        limits::MIN_REMINDER_INTERVAL_MIN,
                        limits::MAX_REMINDER_INTERVAL_MIN
                    ),
                )
                .await
            }
            Command::History => match self.store.get(user_id).await {
                Some(record) if !record.history.is_empty() => {
                    vec![messages::history(record.recent_history(HISTORY_DAYS))]
                }
                Some(_) => vec!["📊 No history yet. Keep drinking water! 💧".to_string()],
                None => vec![NOT_REGISTERED.to_string()],
            },
            Command::Reset => {
                if self.store.remove(user_id).await {
                    tracing::info!(user_id = %user_id, "User reset");
                }
                vec!["🔄 Your data was deleted. Send /start to set things up again.".to_string()]
            }
        }
    }

    async fn start(&self, user_id: &str, sender_name: &str) -> Vec<String> {
        let now = self.clock.now();
        let (record, created) = self.store.get_or_create(user_id, sender_name, now).await;
        if created {
            return vec![messages::questionnaire_start(&record.name)];
        }

        let restarted = self
            .store
            .update(user_id, |record| Ok::<_, ()>(restart_or_settle(record)))
            .await;

        match restarted {
            Ok(Some(true)) => vec![messages::questionnaire_start(&record.name)],
            Ok(Some(false)) => vec![
                "You're already set up! ✅ Send /status to see your profile or /help for commands."
                    .to_string(),
            ],
            // Reset between the two calls; treat like a fresh contact next time.
            Ok(None) | Err(()) => vec![NOT_REGISTERED.to_string()],
        }
    }

    async fn stop(&self, user_id: &str) -> Vec<String> {
        let outcome = self
            .store
            .update(user_id, |record| {
                if record.step.is_onboarding() {
                    return Ok::<_, ()>(false);
                }
                record.reminders_enabled = false;
                Ok(true)
            })
            .await;

        match outcome {
            Ok(Some(true)) => {
                tracing::info!(user_id = %user_id, "Reminders paused");
                vec!["⏸️ Reminders paused. Send /resume when you want them back.".to_string()]
            }
            Ok(Some(false)) => vec![
                "There's nothing to pause yet. Let's finish setting up first!".to_string(),
            ],
            Ok(None) | Err(()) => vec![NOT_REGISTERED.to_string()],
        }
    }

    async fn resume(&self, user_id: &str) -> Vec<String> {
        let now = self.clock.now();
        let outcome = self
            .store
            .update(user_id, |record| {
                if record.step.is_onboarding() || record.reminder_interval_ms.is_none() {
                    return Ok::<_, ()>(None);
                }
                record.reminders_enabled = true;
                record.last_reminder_at = now;
                Ok(record.reminder_interval_minutes())
            })
            .await;

        match outcome {
            Ok(Some(Some(minutes))) => {
                tracing::info!(user_id = %user_id, "Reminders resumed");
                vec![format!(
                    "▶️ Reminders are back on! Next one in {minutes} minutes."
                )]
            }
            Ok(Some(None)) => vec![
                "Reminders start once setup is done. Let's finish it first!".to_string(),
            ],
            Ok(None) | Err(()) => vec![NOT_REGISTERED.to_string()],
        }
    }

    async fn begin_edit(&self, user_id: &str, step: Step, question: String) -> Vec<String> {
        let outcome = self
            .store
            .update(user_id, |record| {
                record.step = step;
                Ok::<_, ()>(())
            })
            .await;

        match outcome {
            Ok(Some(())) => vec![question],
            Ok(None) | Err(()) => vec![NOT_REGISTERED.to_string()],
        }
    }
}

/// `/start` on an existing record: restart onboarding when setup is not
/// complete, otherwise cancel any pending edit. Returns whether it restarted.
fn restart_or_settle(record: &mut UserRecord) -> bool {
    if record.step.is_onboarding() || !record.is_configured() {
        record.step = Step::AwaitingAge;
        true
    } else {
        record.step = Step::Idle;
        false
    }
}
