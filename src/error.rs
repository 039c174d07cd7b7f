//! Error types for the hydration bot.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// User store persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed store file {path}: {reason}")]
    Malformed { path: String, reason: String },
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send message on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Send on channel {name} timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    #[error("Channel health check failed: {name}")]
    HealthCheckFailed { name: String },
}

/// Reply generation errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Provider {provider} returned an empty response")]
    EmptyResponse { provider: String },
}

/// Rejected user input during onboarding or an edit command.
///
/// Never accompanied by a state change; the user is expected to retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid age: {0:?}")]
    Age(String),

    #[error("invalid weight: {0:?}")]
    Weight(String),

    #[error("invalid activity level: {0:?}")]
    ActivityLevel(String),

    #[error("invalid reminder interval: {0:?}")]
    Interval(String),

    #[error("invalid water goal: {0:?}")]
    WaterGoal(String),
}

impl ValidationError {
    /// Corrective message shown to the user.
    pub fn user_message(&self) -> String {
        use crate::config::limits::*;
        match self {
            Self::Age(_) => {
                format!("Please send your age as a whole number between {MIN_AGE} and {MAX_AGE}.")
            }
            Self::Weight(_) => format!(
                "Please send your weight in kg as a number between {MIN_WEIGHT_KG} and {MAX_WEIGHT_KG} (e.g. 70 or 70,5)."
            ),
            Self::ActivityLevel(_) => "Please answer with 1, 2, 3 or 4.".to_string(),
            Self::Interval(_) => format!(
                "Please send the interval in minutes as a whole number between {MIN_REMINDER_INTERVAL_MIN} and {MAX_REMINDER_INTERVAL_MIN}."
            ),
            Self::WaterGoal(_) => format!(
                "Please send your goal in liters as a number between {MIN_WATER_GOAL_LITERS} and {MAX_WATER_GOAL_LITERS} (e.g. 2.5)."
            ),
        }
    }
}
