//! Onboarding state machine: the step a user is on and the pure transition
//! applied when they answer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::goal::{self, ActivityLevel};

use super::model::UserRecord;
use super::validate;

/// Where a user is in the conversation.
///
/// Onboarding progresses linearly: AwaitingAge → AwaitingWeight →
/// AwaitingActivity → AwaitingInterval → Idle. The two edit steps are
/// entered by command from any step and always return to Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Onboarding complete; free conversation.
    Idle,
    AwaitingAge,
    AwaitingWeight,
    AwaitingActivity,
    AwaitingInterval,
    AwaitingNewGoal,
    AwaitingNewInterval,
}

impl Step {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Whether this is one of the four first-time onboarding questions.
    pub fn is_onboarding(&self) -> bool {
        matches!(
            self,
            Self::AwaitingAge | Self::AwaitingWeight | Self::AwaitingActivity | Self::AwaitingInterval
        )
    }

    /// Step reached after a valid answer.
    pub fn next(&self) -> Option<Step> {
        use Step::*;
        match self {
            AwaitingAge => Some(AwaitingWeight),
            AwaitingWeight => Some(AwaitingActivity),
            AwaitingActivity => Some(AwaitingInterval),
            AwaitingInterval | AwaitingNewGoal | AwaitingNewInterval => Some(Idle),
            Idle => None,
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::AwaitingAge => "awaiting_age",
            Self::AwaitingWeight => "awaiting_weight",
            Self::AwaitingActivity => "awaiting_activity",
            Self::AwaitingInterval => "awaiting_interval",
            Self::AwaitingNewGoal => "awaiting_new_goal",
            Self::AwaitingNewInterval => "awaiting_new_interval",
        };
        write!(f, "{s}")
    }
}

/// What an accepted answer changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    AgeSet { age: u32 },
    WeightSet { weight: Decimal, base_goal: Decimal },
    ActivitySet { level: ActivityLevel, goal: Decimal },
    SetupComplete { goal: Decimal, interval_minutes: u64 },
    GoalUpdated { goal: Decimal },
    IntervalUpdated { interval_minutes: u64 },
}

/// Why an answer could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// A step was reached without the fields it builds on. Only possible
    /// with a hand-edited store file.
    #[error("step {step} is missing earlier answer: {missing}")]
    MissingField { step: Step, missing: &'static str },

    #[error("no question is pending")]
    NotAwaitingInput,
}

/// Apply one answer to `record`.
///
/// On error the record is left exactly as it was.
pub fn apply_input(
    record: &mut UserRecord,
    input: &str,
    now: DateTime<Utc>,
) -> Result<Transition, StepError> {
    let step = record.step;
    let input = validate::normalize(input);

    let transition = match step {
        Step::AwaitingAge => {
            let age = validate::parse_age(&input)?;
            record.age = Some(age);
            Transition::AgeSet { age }
        }
        Step::AwaitingWeight => {
            let weight = validate::parse_weight(&input)?;
            let age = record.age.ok_or(StepError::MissingField {
                step,
                missing: "age",
            })?;
            let base_goal = goal::compute_base_goal(age, weight);
            record.weight = Some(weight);
            record.water_goal = Some(base_goal);
            Transition::WeightSet { weight, base_goal }
        }
        Step::AwaitingActivity => {
            let level = validate::parse_activity_level(&input)?;
            let base = record.water_goal.ok_or(StepError::MissingField {
                step,
                missing: "water goal",
            })?;
            let goal = goal::apply_activity_adjustment(base, level);
            record.activity_level = Some(level);
            record.water_goal = Some(goal);
            Transition::ActivitySet { level, goal }
        }
        Step::AwaitingInterval => {
            let minutes = validate::parse_interval_minutes(&input)?;
            let goal = record.water_goal.ok_or(StepError::MissingField {
                step,
                missing: "water goal",
            })?;
            record.reminder_interval_ms = Some(minutes * 60_000);
            record.reminders_enabled = true;
            record.last_reminder_at = now;
            Transition::SetupComplete {
                goal,
                interval_minutes: minutes,
            }
        }
        Step::AwaitingNewGoal => {
            let goal = goal::two_places(validate::parse_water_goal(&input)?);
            record.water_goal = Some(goal);
            Transition::GoalUpdated { goal }
        }
        Step::AwaitingNewInterval => {
            let minutes = validate::parse_interval_minutes(&input)?;
            record.reminder_interval_ms = Some(minutes * 60_000);
            Transition::IntervalUpdated {
                interval_minutes: minutes,
            }
        }
        Step::Idle => return Err(StepError::NotAwaitingInput),
    };

    if let Some(next) = step.next() {
        record.step = next;
    }
    Ok(transition)
}
