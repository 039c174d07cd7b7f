//! Persisted user record and its history entries.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::goal::ActivityLevel;

use super::state::Step;

/// One day of tracked intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub consumed_liters: Decimal,
    pub goal_liters: Decimal,
}

impl HistoryEntry {
    /// Consumed over goal as a whole percentage. A zero goal reads as 0%.
    pub fn percent_of_goal(&self) -> u32 {
        if self.goal_liters.is_zero() {
            return 0;
        }
        let ratio = self.consumed_liters / self.goal_liters * Decimal::ONE_HUNDRED;
        ratio
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u32()
            .unwrap_or(0)
    }
}

/// Everything the bot knows about one user.
///
/// The JSON shape is the on-disk store format; keep field names stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub name: String,
    pub step: Step,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, rename = "weightKg", skip_serializing_if = "Option::is_none")]
    pub weight: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_level: Option<ActivityLevel>,
    #[serde(default, rename = "waterGoalLiters", skip_serializing_if = "Option::is_none")]
    pub water_goal: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_interval_ms: Option<u64>,
    #[serde(default)]
    pub reminders_enabled: bool,
    /// Epoch milliseconds on disk; the epoch itself means "never sent".
    #[serde(default = "epoch", with = "chrono::serde::ts_milliseconds")]
    pub last_reminder_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

impl UserRecord {
    /// A fresh record at the start of onboarding.
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            step: Step::AwaitingAge,
            age: None,
            weight: None,
            activity_level: None,
            water_goal: None,
            reminder_interval_ms: None,
            reminders_enabled: false,
            last_reminder_at: epoch(),
            created_at,
            streak: 0,
            history: Vec::new(),
        }
    }

    /// Whether onboarding has collected every field reminders depend on.
    pub fn is_configured(&self) -> bool {
        self.age.is_some()
            && self.weight.is_some()
            && self.activity_level.is_some()
            && self.water_goal.is_some()
            && self.reminder_interval_ms.is_some()
    }

    pub fn is_idle(&self) -> bool {
        self.step.is_terminal()
    }

    pub fn reminder_interval(&self) -> Option<Duration> {
        self.reminder_interval_ms
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
    }

    pub fn reminder_interval_minutes(&self) -> Option<u64> {
        self.reminder_interval_ms.map(|ms| ms / 60_000)
    }

    /// Active users are the ones the reminder scan looks at.
    pub fn is_active(&self) -> bool {
        self.reminders_enabled && self.reminder_interval().is_some()
    }

    /// Whether a reminder is owed at `now`.
    pub fn is_reminder_due(&self, now: DateTime<Utc>) -> bool {
        let Some(interval) = self.reminder_interval() else {
            return false;
        };
        let Ok(interval) = chrono::Duration::from_std(interval) else {
            return false;
        };
        now.signed_duration_since(self.last_reminder_at) >= interval
    }

    /// Append a day to the history. Entries must arrive in date order.
    pub fn append_history(&mut self, entry: HistoryEntry) -> Result<(), String> {
        if let Some(last) = self.history.last()
            && entry.date < last.date
        {
            return Err(format!(
                "history entry for {} precedes the latest entry {}",
                entry.date, last.date
            ));
        }
        self.history.push(entry);
        Ok(())
    }

    /// Up to `n` most recent history entries, oldest first.
    pub fn recent_history(&self, n: usize) -> &[HistoryEntry] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use super::*;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap()
    }

    fn configured() -> UserRecord {
        UserRecord {
            step: Step::Idle,
            age: Some(25),
            weight: Some(dec!(70)),
            activity_level: Some(ActivityLevel::Light),
            water_goal: Some(dec!(3.10)),
            reminder_interval_ms: Some(30 * 60_000),
            reminders_enabled: true,
            ..UserRecord::new("Ana", created())
        }
    }

    fn day(d: u32, consumed: Decimal, goal: Decimal) -> HistoryEntry {
        HistoryEntry {
            date: NaiveDate::from_ymd_opt(2026, 5, d).unwrap(),
            consumed_liters: consumed,
            goal_liters: goal,
        }
    }

    #[test]
    fn new_record_awaits_age() {
        let record = UserRecord::new("Ana", created());
        assert_eq!(record.step, Step::AwaitingAge);
        assert!(!record.is_configured());
        assert!(!record.reminders_enabled);
        assert_eq!(record.last_reminder_at, epoch());
        assert!(!record.is_active());
    }

    #[test]
    fn serializes_with_store_field_names() {
        let json = serde_json::to_value(configured()).unwrap();
        assert_eq!(json["waterGoalLiters"], "3.10");
        assert_eq!(json["weightKg"], "70");
        assert_eq!(json["activityLevel"], 2);
        assert_eq!(json["reminderIntervalMs"], 1_800_000);
        assert_eq!(json["remindersEnabled"], true);
        assert_eq!(json["lastReminderAt"], 0);
        assert_eq!(json["createdAt"], created().timestamp_millis());
        assert_eq!(json["step"], "idle");
    }

    #[test]
    fn missing_optional_fields_default() {
        let json = r#"{"name":"Bo","step":"awaiting_weight","age":40,"createdAt":1700000000000}"#;
        let record: UserRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.step, Step::AwaitingWeight);
        assert_eq!(record.age, Some(40));
        assert!(record.history.is_empty());
        assert_eq!(record.last_reminder_at, epoch());
    }

    #[test]
    fn due_check_uses_interval() {
        let mut record = configured();
        let now = created() + chrono::Duration::hours(5);
        record.last_reminder_at = now - chrono::Duration::minutes(29);
        assert!(!record.is_reminder_due(now));
        record.last_reminder_at = now - chrono::Duration::minutes(30);
        assert!(record.is_reminder_due(now));
    }

    #[test]
    fn zero_interval_is_never_active() {
        let mut record = configured();
        record.reminder_interval_ms = Some(0);
        assert!(!record.is_active());
        assert!(!record.is_reminder_due(created()));
    }

    #[test]
    fn history_is_append_only_in_date_order() {
        let mut record = configured();
        record.append_history(day(1, dec!(2), dec!(3))).unwrap();
        record.append_history(day(1, dec!(1), dec!(3))).unwrap();
        record.append_history(day(3, dec!(3), dec!(3))).unwrap();
        assert!(record.append_history(day(2, dec!(3), dec!(3))).is_err());
        assert_eq!(record.history.len(), 3);
    }

    #[test]
    fn recent_history_keeps_tail() {
        let mut record = configured();
        for d in 1..=10 {
            record.append_history(day(d, dec!(2), dec!(2))).unwrap();
        }
        let recent = record.recent_history(7);
        assert_eq!(recent.len(), 7);
        assert_eq!(recent[0].date.to_string(), "2026-05-04");
        assert_eq!(record.recent_history(50).len(), 10);
    }

    #[test]
    fn percent_of_goal() {
        assert_eq!(day(1, dec!(1.5), dec!(3)).percent_of_goal(), 50);
        assert_eq!(day(1, dec!(2), dec!(3)).percent_of_goal(), 67);
        assert_eq!(day(1, dec!(4.5), dec!(3)).percent_of_goal(), 150);
        assert_eq!(day(1, dec!(1), dec!(0)).percent_of_goal(), 0);
    }
}
