//! Parsers for free-text answers. Each returns the typed value or the
//! kind-specific `ValidationError`.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::config::limits;
use crate::error::ValidationError;
use crate::goal::ActivityLevel;

/// Answers are compared trimmed and lower-cased.
pub fn normalize(input: &str) -> String {
    input.trim().to_lowercase()
}

/// Parse a decimal accepting either `,` or `.` as separator.
fn parse_decimal(input: &str) -> Option<Decimal> {
    let normalized = input.trim().replacen(',', ".", 1);
    if normalized.is_empty() {
        return None;
    }
    Decimal::from_str(&normalized).ok()
}

pub fn parse_age(input: &str) -> Result<u32, ValidationError> {
    input
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|age| (limits::MIN_AGE..=limits::MAX_AGE).contains(age))
        .ok_or_else(|| ValidationError::Age(input.to_string()))
}

pub fn parse_weight(input: &str) -> Result<Decimal, ValidationError> {
    let min = Decimal::from(limits::MIN_WEIGHT_KG);
    let max = Decimal::from(limits::MAX_WEIGHT_KG);
    parse_decimal(input)
        .filter(|w| *w >= min && *w <= max)
        .ok_or_else(|| ValidationError::Weight(input.to_string()))
}

pub fn parse_activity_level(input: &str) -> Result<ActivityLevel, ValidationError> {
    input
        .trim()
        .parse::<u8>()
        .ok()
        .and_then(ActivityLevel::from_level)
        .ok_or_else(|| ValidationError::ActivityLevel(input.to_string()))
}

/// Reminder interval in minutes.
pub fn parse_interval_minutes(input: &str) -> Result<u64, ValidationError> {
    input
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|m| {
            (limits::MIN_REMINDER_INTERVAL_MIN..=limits::MAX_REMINDER_INTERVAL_MIN).contains(m)
        })
        .ok_or_else(|| ValidationError::Interval(input.to_string()))
}

pub fn parse_water_goal(input: &str) -> Result<Decimal, ValidationError> {
    let min = Decimal::from(limits::MIN_WATER_GOAL_LITERS);
    let max = Decimal::from(limits::MAX_WATER_GOAL_LITERS);
    parse_decimal(input)
        .filter(|g| *g >= min && *g <= max)
        .ok_or_else(|| ValidationError::WaterGoal(input.to_string()))
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn age_bounds() {
        assert_eq!(parse_age("10"), Ok(10));
        assert_eq!(parse_age(" 120 "), Ok(120));
        assert!(parse_age("9").is_err());
        assert!(parse_age("121").is_err());
        assert!(parse_age("1").is_err());
    }

    #[test]
    fn age_rejects_non_integers() {
        for bad in ["", "abc", "25.5", "25 years", "-30"] {
            assert!(
                matches!(parse_age(bad), Err(ValidationError::Age(_))),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn weight_accepts_comma_and_dot() {
        assert_eq!(parse_weight("70,5"), Ok(dec!(70.5)));
        assert_eq!(parse_weight("70.5"), Ok(dec!(70.5)));
        assert_eq!(parse_weight("30"), Ok(dec!(30)));
        assert_eq!(parse_weight("300"), Ok(dec!(300)));
    }

    #[test]
    fn weight_bounds() {
        assert!(parse_weight("29.99").is_err());
        assert!(parse_weight("300.01").is_err());
        assert!(parse_weight("250").is_ok());
        assert!(parse_weight("heavy").is_err());
        assert!(parse_weight("").is_err());
    }

    #[test]
    fn activity_levels() {
        assert_eq!(parse_activity_level("1"), Ok(ActivityLevel::Sedentary));
        assert_eq!(parse_activity_level("4"), Ok(ActivityLevel::Intense));
        assert!(parse_activity_level("0").is_err());
        assert!(parse_activity_level("5").is_err());
        assert!(parse_activity_level("two").is_err());
    }

    #[test]
    fn interval_bounds() {
        assert_eq!(parse_interval_minutes("15"), Ok(15));
        assert_eq!(parse_interval_minutes("240"), Ok(240));
        assert!(parse_interval_minutes("14").is_err());
        assert!(parse_interval_minutes("241").is_err());
        assert!(parse_interval_minutes("30.5").is_err());
    }

    #[test]
    fn water_goal_bounds() {
        assert_eq!(parse_water_goal("2,5"), Ok(dec!(2.5)));
        assert_eq!(parse_water_goal("1"), Ok(dec!(1)));
        assert_eq!(parse_water_goal("10"), Ok(dec!(10)));
        assert!(parse_water_goal("0.99").is_err());
        assert!(parse_water_goal("10.5").is_err());
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize("  /STATUS \n"), "/status");
    }
}
