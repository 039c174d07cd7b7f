//! Daily water goal computation.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Self-reported physical activity, answered as 1-4 during onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Intense,
}

impl ActivityLevel {
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Sedentary),
            2 => Some(Self::Light),
            3 => Some(Self::Moderate),
            4 => Some(Self::Intense),
            _ => None,
        }
    }

    pub fn level(self) -> u8 {
        match self {
            Self::Sedentary => 1,
            Self::Light => 2,
            Self::Moderate => 3,
            Self::Intense => 4,
        }
    }

    /// Liters added on top of the weight-based goal.
    pub fn adjustment(self) -> Decimal {
        match self {
            Self::Sedentary => dec!(0.0),
            Self::Light => dec!(0.3),
            Self::Moderate => dec!(0.5),
            Self::Intense => dec!(0.8),
        }
    }
}

impl TryFrom<u8> for ActivityLevel {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::from_level(level).ok_or_else(|| format!("activity level {level} is not in 1..=4"))
    }
}

impl From<ActivityLevel> for u8 {
    fn from(level: ActivityLevel) -> Self {
        level.level()
    }
}

impl std::fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Sedentary => "sedentary",
            Self::Light => "light",
            Self::Moderate => "moderate",
            Self::Intense => "intense",
        };
        write!(f, "{s}")
    }
}

/// Liters per kg of body weight for a given age.
fn multiplier(age: u32) -> Decimal {
    if age < 30 {
        dec!(0.040)
    } else if age > 65 {
        dec!(0.030)
    } else {
        dec!(0.035)
    }
}

/// Round half away from zero and pin the scale at two places, so `3.1`
/// is carried and rendered as `3.10`.
pub fn two_places(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Weight-based daily goal in liters.
pub fn compute_base_goal(age: u32, weight_kg: Decimal) -> Decimal {
    two_places(weight_kg * multiplier(age))
}

/// Final goal after the activity adjustment.
pub fn apply_activity_adjustment(base_goal: Decimal, level: ActivityLevel) -> Decimal {
    two_places(base_goal + level.adjustment())
}
