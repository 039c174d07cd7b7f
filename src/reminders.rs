//! Reminder engine: periodically scans active users and sends the reminders
//! that are due.
//!
//! A tick never fails as a whole. Each due user is handled on its own: a
//! failed or timed-out send is logged and the user's `last_reminder_at` still
//! advances, so a broken transport is not retried every tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::channels::Channel;
use crate::clock::Clock;
use crate::config::ReminderConfig;
use crate::error::ChannelError;
use crate::interactions::{InteractionKind, InteractionLog};
use crate::messages::{self, TemplatePicker};
use crate::store::UserStore;

/// What one tick did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub skipped_outside_hours: bool,
    /// Users found due in the snapshot.
    pub due: usize,
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    Sent,
    Failed,
    /// Paused, removed or already served since the snapshot.
    Skipped,
}

pub struct ReminderEngine {
    config: ReminderConfig,
    store: Arc<UserStore>,
    channel: Arc<dyn Channel>,
    clock: Arc<dyn Clock>,
    picker: Arc<TemplatePicker>,
    log: InteractionLog,
}

impl ReminderEngine {
    pub fn new(
        config: ReminderConfig,
        store: Arc<UserStore>,
        channel: Arc<dyn Channel>,
        clock: Arc<dyn Clock>,
        picker: Arc<TemplatePicker>,
        log: InteractionLog,
    ) -> Self {
        Self {
            config,
            store,
            channel,
            clock,
            picker,
            log,
        }
    }

    /// Run one scan.
    pub async fn tick(&self) -> TickReport {
        let hour = self.clock.hour();
        if !self.config.within_business_hours(hour) {
            debug!(hour, "Outside business hours, skipping reminder scan");
            return TickReport {
                skipped_outside_hours: true,
                ..TickReport::default()
            };
        }

        let now = self.clock.now();
        let due: Vec<String> = self
            .store
            .active_users()
            .await
            .into_iter()
            .filter(|(_, record)| record.is_reminder_due(now))
            .map(|(id, _)| id)
            .collect();

        let mut report = TickReport {
            due: due.len(),
            ..TickReport::default()
        };
        if due.is_empty() {
            return report;
        }

        let outcomes: Vec<Dispatch> = futures::stream::iter(due)
            .map(|user_id| async move { self.dispatch_due(&user_id, now).await })
            .buffer_unordered(self.config.max_concurrent_sends.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                Dispatch::Sent => report.sent += 1,
                Dispatch::Failed => report.failed += 1,
                Dispatch::Skipped => {}
            }
        }

        if report.sent + report.failed > 0 {
            info!(
                due = report.due,
                sent = report.sent,
                failed = report.failed,
                "Reminder scan finished"
            );
        }
        report
    }

    /// Re-check a user from the snapshot and send if still due.
    async fn dispatch_due(&self, user_id: &str, now: DateTime<Utc>) -> Dispatch {
        let Some(record) = self.store.get(user_id).await else {
            return Dispatch::Skipped;
        };
        if !record.is_active() || !record.is_reminder_due(now) {
            return Dispatch::Skipped;
        }

        let text = messages::reminder(&self.picker, &record);
        let result = self.send_with_timeout(user_id, &text).await;
        self.advance(user_id, now).await;

        match result {
            Ok(()) => {
                self.log.append(user_id, InteractionKind::Reminder, text);
                Dispatch::Sent
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Reminder send failed");
                Dispatch::Failed
            }
        }
    }

    /// Send one reminder now, ignoring business hours and the interval.
    ///
    /// Returns `Ok(false)` for an unknown user.
    pub async fn send_now(&self, user_id: &str) -> Result<bool, ChannelError> {
        let Some(record) = self.store.get(user_id).await else {
            return Ok(false);
        };

        let text = messages::reminder(&self.picker, &record);
        let result = self.send_with_timeout(user_id, &text).await;
        self.advance(user_id, self.clock.now()).await;
        result?;

        self.log.append(user_id, InteractionKind::Reminder, text);
        Ok(true)
    }

    async fn send_with_timeout(&self, user_id: &str, text: &str) -> Result<(), ChannelError> {
        let timeout = self.config.send_timeout;
        match tokio::time::timeout(timeout, self.channel.send(user_id, text)).await {
            Ok(result) => result,
            Err(_) => Err(ChannelError::Timeout {
                name: self.channel.name().to_string(),
                timeout,
            }),
        }
    }

    /// Move `last_reminder_at` forward. Never creates or re-enables a record.
    async fn advance(&self, user_id: &str, now: DateTime<Utc>) {
        let updated = self
            .store
            .update(user_id, |record| {
                record.last_reminder_at = now;
                Ok::<_, ()>(())
            })
            .await;
        if let Ok(None) = updated {
            debug!(user_id = %user_id, "User removed while a reminder was in flight");
        }
    }
}

/// Spawn the periodic scan. The first tick fires one `period` after start.
///
/// The task ends when `shutdown` becomes `true` or its sender is dropped. A
/// scan already running at that point gets `drain` to finish and is then
/// dropped, cancelling its outstanding sends.
pub fn spawn_reminder_ticker(
    engine: Arc<ReminderEngine>,
    period: Duration,
    drain: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // Skip immediate first tick
        ticker.tick().await;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let scan = engine.tick();
                    tokio::pin!(scan);
                    tokio::select! {
                        _ = &mut scan => {}
                        _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => {
                            if tokio::time::timeout(drain, &mut scan).await.is_err() {
                                warn!(?drain, "Reminder scan cancelled at shutdown");
                            }
                            break;
                        }
                    }
                }
            }
        }
        info!("Reminder ticker stopped");
    })
}
