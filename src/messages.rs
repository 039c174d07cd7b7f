//! User-facing text: onboarding questions, confirmations, status cards,
//! reminder templates and the seeded picker used to choose among templates.

use std::sync::Mutex;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rust_decimal::Decimal;

use crate::onboarding::model::{HistoryEntry, UserRecord};
use crate::onboarding::state::Transition;

/// Uniform choice among templates. Seed it to make choices reproducible.
pub struct TemplatePicker {
    rng: Mutex<StdRng>,
}

impl TemplatePicker {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Pick one item. Returns `None` only for an empty slice.
    pub fn pick<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        items.choose(&mut *rng)
    }
}

impl std::fmt::Debug for TemplatePicker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplatePicker").finish_non_exhaustive()
    }
}

/// Reminder texts. `{name}` and `{goal}` are filled in per user.
const REMINDER_TEMPLATES: &[&str] = &[
    "💧 Hey {name}, water time! Your body will thank you.",
    "🚰 {name}, how about a quick hydration break?",
    "💦 Friendly reminder: water is life, {name}!",
    "💪 Stay focused, {name}! Time for another glass of water.",
    "🌊 Hydrated means energized. Grab some water, {name}?",
    "⚡ {name}, your body needs water to work at its best!",
    "🎯 Daily goal: {goal}L. Let's get there together, {name}!",
    "🌟 Every sip counts! Time to hydrate, {name}.",
    "🏃 Keep the pace, {name}! Time for your hydration dose.",
    "🌿 Zen moment: pause for a bit and drink some water, {name}.",
];

fn display_name(name: &str) -> &str {
    let trimmed = name.trim();
    if trimmed.is_empty() { "friend" } else { trimmed }
}

fn goal_text(goal: Option<Decimal>) -> String {
    goal.map(|g| g.to_string())
        .unwrap_or_else(|| "2.50".to_string())
}

/// A randomly chosen reminder for `record`.
pub fn reminder(picker: &TemplatePicker, record: &UserRecord) -> String {
    let name = display_name(&record.name);
    let goal = goal_text(record.water_goal);
    let template = picker
        .pick(REMINDER_TEMPLATES)
        .copied()
        .unwrap_or("💧 Time to drink some water, {name}!");
    template.replace("{name}", name).replace("{goal}", &goal)
}

pub fn welcome(name: &str, bot_name: &str) -> String {
    format!("Hi {}! 👋 Welcome to {bot_name}! 💧", display_name(name))
}

pub fn questionnaire_start(name: &str) -> String {
    format!(
        "Great, {}! 😄\nBefore setting up your reminders I'd like to get to know you a little.\n\nHow old are you?",
        display_name(name)
    )
}

pub fn activity_question() -> &'static str {
    "Now tell me: do you exercise?\n\n\
     1️⃣ Sedentary\n\
     2️⃣ Light (1-2x/week)\n\
     3️⃣ Moderate (3-4x/week)\n\
     4️⃣ Intense (5+/week)"
}

/// Replies for an accepted onboarding or edit answer, in sending order.
pub fn transition_replies(
    transition: &Transition,
    name: &str,
    hours: (u32, u32),
) -> Vec<String> {
    let name = display_name(name);
    match transition {
        Transition::AgeSet { .. } => {
            vec!["Nice! Now tell me your approximate weight (in kg).".to_string()]
        }
        Transition::WeightSet { base_goal, .. } => vec![format!(
            "I calculated your goal: *{base_goal} liters/day* 💧\n\n{}",
            activity_question()
        )],
        Transition::ActivitySet { goal, .. } => vec![format!(
            "Adjusted goal: *{goal} liters/day* 🎯\n\n\
             Last question: how often, in minutes, do you want reminders?\n\
             (Send a number, e.g. 30 for every half hour)"
        )],
        Transition::SetupComplete {
            goal,
            interval_minutes,
        } => vec![
            format!(
                "All set, {name}! 🎉\n\
                 I'll remind you every *{interval_minutes} minutes* during the day (between {}h and {}h).\n\n\
                 Your goal is *{goal} liters/day* 💧\n\n\
                 Send /stop to pause reminders or /interval to change how often they come.",
                hours.0, hours.1
            ),
            format!(
                "{name}, you're all configured! 🎯\n\n\
                 Any questions about hydration or your health goals? I'm here to help! 💧"
            ),
        ],
        Transition::GoalUpdated { goal } => {
            vec![format!("Goal updated to {goal} liters/day! 🎯")]
        }
        Transition::IntervalUpdated { interval_minutes } => {
            vec![format!("Interval updated to {interval_minutes} minutes! ⏰")]
        }
    }
}

pub fn status(record: &UserRecord) -> String {
    let reminders = if record.reminders_enabled {
        "🟢 Active"
    } else {
        "🔴 Paused"
    };
    let interval = record
        .reminder_interval_minutes()
        .map(|m| format!("{m} minutes"))
        .unwrap_or_else(|| "Not set".to_string());

    format!(
        "📊 *Your Hydration Profile*\n\
         👤 Name: {}\n\
         💧 Daily goal: {} liters\n\
         ⏰ Interval: {interval}\n\
         🔔 Reminders: {reminders}\n\
         📅 Joined: {}\n\
         🏆 Streak: {} days",
        display_name(&record.name),
        goal_text(record.water_goal),
        record.created_at.format("%Y-%m-%d"),
        record.streak,
    )
}

/// Ten-cell progress bar, saturating at 100%.
fn progress_bar(percent: u32) -> String {
    let filled = (percent / 10).min(10) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

pub fn history(entries: &[HistoryEntry]) -> String {
    let mut report = format!("📈 *Your Progress (last {} days)*\n\n", entries.len());
    for entry in entries {
        let percent = entry.percent_of_goal();
        report.push_str(&format!(
            "{}: {} {percent}%\n",
            entry.date,
            progress_bar(percent)
        ));
    }
    report
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::onboarding::state::Step;

    fn record() -> UserRecord {
        UserRecord {
            step: Step::Idle,
            water_goal: Some(dec!(3.10)),
            reminder_interval_ms: Some(30 * 60_000),
            reminders_enabled: true,
            ..UserRecord::new("Ana", Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap())
        }
    }

    #[test]
    fn seeded_pickers_agree() {
        let a = TemplatePicker::seeded(42);
        let b = TemplatePicker::seeded(42);
        let items: Vec<u32> = (0..100).collect();
        for _ in 0..20 {
            assert_eq!(a.pick(&items), b.pick(&items));
        }
    }

    #[test]
    fn picker_covers_every_template() {
        let picker = TemplatePicker::seeded(7);
        let items = [0usize, 1, 2, 3];
        let mut seen = [false; 4];
        for _ in 0..200 {
            seen[*picker.pick(&items).unwrap()] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn picker_on_empty_slice() {
        let picker = TemplatePicker::seeded(1);
        let empty: [u8; 0] = [];
        assert!(picker.pick(&empty).is_none());
    }

    #[test]
    fn reminder_mentions_name() {
        let picker = TemplatePicker::seeded(3);
        for _ in 0..30 {
            assert!(reminder(&picker, &record()).contains("Ana"));
        }
    }

    #[test]
    fn reminder_falls_back_to_generic_name() {
        let picker = TemplatePicker::seeded(3);
        let nameless = UserRecord {
            name: "  ".to_string(),
            ..record()
        };
        assert!(reminder(&picker, &nameless).contains("friend"));
    }

    #[test]
    fn status_renders_fields() {
        let text = status(&record());
        assert!(text.contains("Ana"));
        assert!(text.contains("3.10 liters"));
        assert!(text.contains("30 minutes"));
        assert!(text.contains("Active"));
        assert!(text.contains("2026-01-02"));
    }

    #[test]
    fn status_for_paused_user() {
        let paused = UserRecord {
            reminders_enabled: false,
            ..record()
        };
        assert!(status(&paused).contains("Paused"));
    }

    #[test]
    fn setup_complete_sends_two_replies() {
        let replies = transition_replies(
            &Transition::SetupComplete {
                goal: dec!(3.10),
                interval_minutes: 30,
            },
            "Ana",
            (8, 22),
        );
        assert_eq!(replies.len(), 2);
        assert!(replies[0].contains("30 minutes"));
        assert!(replies[0].contains("3.10 liters/day"));
        assert!(replies[0].contains("between 8h and 22h"));
    }

    #[test]
    fn weight_reply_asks_activity() {
        let replies = transition_replies(
            &Transition::WeightSet {
                weight: dec!(70),
                base_goal: dec!(2.80),
            },
            "Ana",
            (8, 22),
        );
        assert!(replies[0].contains("2.80 liters/day"));
        assert!(replies[0].contains("4️⃣"));
    }

    #[test]
    fn history_bars_saturate() {
        let entries = [
            HistoryEntry {
                date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
                consumed_liters: dec!(1.5),
                goal_liters: dec!(3),
            },
            HistoryEntry {
                date: NaiveDate::from_ymd_opt(2026, 5, 2).unwrap(),
                consumed_liters: dec!(6),
                goal_liters: dec!(3),
            },
        ];
        let text = history(&entries);
        assert!(text.contains("2026-05-01: █████░░░░░ 50%"));
        assert!(text.contains("2026-05-02: ██████████ 200%"));
    }
}
