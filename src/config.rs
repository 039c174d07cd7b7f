//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Accepted ranges for onboarding answers and edit commands.
pub mod limits {
    pub const MIN_AGE: u32 = 10;
    pub const MAX_AGE: u32 = 120;
    pub const MIN_WEIGHT_KG: u32 = 30;
    pub const MAX_WEIGHT_KG: u32 = 300;
    pub const MIN_WATER_GOAL_LITERS: u32 = 1;
    pub const MAX_WATER_GOAL_LITERS: u32 = 10;
    pub const MIN_REMINDER_INTERVAL_MIN: u64 = 15;
    pub const MAX_REMINDER_INTERVAL_MIN: u64 = 240;
}

/// Reminder scheduler configuration.
#[derive(Debug, Clone)]
pub struct ReminderConfig {
    /// Period of the reminder scan.
    pub check_interval: Duration,
    /// First hour (local time) in which reminders may go out, inclusive.
    pub business_hours_start: u32,
    /// Last hour (local time) in which reminders may go out, inclusive.
    pub business_hours_end: u32,
    /// Upper bound for a single reminder send.
    pub send_timeout: Duration,
    /// Maximum reminder sends in flight within one tick.
    pub max_concurrent_sends: usize,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            business_hours_start: 8,
            business_hours_end: 22,
            send_timeout: Duration::from_secs(15),
            max_concurrent_sends: 8,
        }
    }
}

impl ReminderConfig {
    /// Whether `hour` falls inside the business-hour window.
    pub fn within_business_hours(&self, hour: u32) -> bool {
        hour >= self.business_hours_start && hour <= self.business_hours_end
    }
}

/// Settings for the Ollama reply generator.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "gpt-oss:20b".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Process-wide configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_name: String,
    pub users_file: PathBuf,
    pub logs_file: PathBuf,
    pub log_interactions: bool,
    pub log_dir: Option<PathBuf>,
    pub reminders: ReminderConfig,
    pub ollama: OllamaConfig,
    pub admin_port: u16,
    /// Key required by the broadcast endpoint. Broadcast is refused when unset.
    pub admin_api_key: Option<SecretString>,
    pub telegram_bot_token: Option<SecretString>,
    /// Time in-flight work gets to finish after a shutdown signal.
    pub shutdown_drain: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_name: "Hydrate Bot".to_string(),
            users_file: PathBuf::from("./data/users.json"),
            logs_file: PathBuf::from("./data/logs.jsonl"),
            log_interactions: true,
            log_dir: None,
            reminders: ReminderConfig::default(),
            ollama: OllamaConfig::default(),
            admin_port: 3000,
            admin_api_key: None,
            telegram_bot_token: None,
            shutdown_drain: Duration::from_secs(10),
        }
    }
}

impl BotConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let reminders = ReminderConfig {
            check_interval: Duration::from_secs(parse_or(
                &get,
                "REMINDER_CHECK_INTERVAL_SECS",
                defaults.reminders.check_interval.as_secs(),
            )?),
            business_hours_start: parse_or(
                &get,
                "BUSINESS_HOURS_START",
                defaults.reminders.business_hours_start,
            )?,
            business_hours_end: parse_or(
                &get,
                "BUSINESS_HOURS_END",
                defaults.reminders.business_hours_end,
            )?,
            send_timeout: Duration::from_secs(parse_or(
                &get,
                "REMINDER_SEND_TIMEOUT_SECS",
                defaults.reminders.send_timeout.as_secs(),
            )?),
            max_concurrent_sends: parse_or(
                &get,
                "REMINDER_MAX_CONCURRENT_SENDS",
                defaults.reminders.max_concurrent_sends,
            )?,
        };

        if reminders.business_hours_start > reminders.business_hours_end
            || reminders.business_hours_end > 23
        {
            return Err(ConfigError::InvalidValue {
                key: "BUSINESS_HOURS_START/BUSINESS_HOURS_END".to_string(),
                message: format!(
                    "window {}..={} is not a valid hour range",
                    reminders.business_hours_start, reminders.business_hours_end
                ),
            });
        }
        if reminders.check_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "REMINDER_CHECK_INTERVAL_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if reminders.max_concurrent_sends == 0 {
            return Err(ConfigError::InvalidValue {
                key: "REMINDER_MAX_CONCURRENT_SENDS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let ollama = OllamaConfig {
            base_url: get("OLLAMA_BASE_URL").unwrap_or(defaults.ollama.base_url),
            model: get("OLLAMA_MODEL").unwrap_or(defaults.ollama.model),
            timeout: Duration::from_secs(parse_or(
                &get,
                "OLLAMA_TIMEOUT_SECS",
                defaults.ollama.timeout.as_secs(),
            )?),
        };

        Ok(Self {
            bot_name: get("BOT_NAME").unwrap_or(defaults.bot_name),
            users_file: get("USERS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.users_file),
            logs_file: get("LOGS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.logs_file),
            log_interactions: get("LOG_INTERACTIONS")
                .map(|v| v.trim() != "false")
                .unwrap_or(defaults.log_interactions),
            log_dir: get("LOG_DIR").map(PathBuf::from),
            reminders,
            ollama,
            admin_port: parse_or(&get, "ADMIN_PORT", defaults.admin_port)?,
            admin_api_key: get("ADMIN_API_KEY").map(SecretString::from),
            telegram_bot_token: get("TELEGRAM_BOT_TOKEN").map(SecretString::from),
            shutdown_drain: Duration::from_secs(parse_or(
                &get,
                "SHUTDOWN_DRAIN_SECS",
                defaults.shutdown_drain.as_secs(),
            )?),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{raw:?}: {e}"),
            }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = BotConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.reminders.check_interval, Duration::from_secs(60));
        assert_eq!(config.reminders.business_hours_start, 8);
        assert_eq!(config.reminders.business_hours_end, 22);
        assert!(config.log_interactions);
        assert!(config.admin_api_key.is_none());
        assert!(config.telegram_bot_token.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = BotConfig::from_lookup(lookup(&[
            ("BUSINESS_HOURS_START", "7"),
            ("BUSINESS_HOURS_END", "20"),
            ("REMINDER_CHECK_INTERVAL_SECS", "30"),
            ("LOG_INTERACTIONS", "false"),
            ("ADMIN_API_KEY", "s3cret"),
            ("USERS_FILE", "/tmp/u.json"),
        ]))
        .unwrap();
        assert_eq!(config.reminders.business_hours_start, 7);
        assert_eq!(config.reminders.business_hours_end, 20);
        assert_eq!(config.reminders.check_interval, Duration::from_secs(30));
        assert!(!config.log_interactions);
        assert_eq!(
            config.admin_api_key.as_ref().map(|k| k.expose_secret()),
            Some("s3cret")
        );
        assert_eq!(config.users_file, PathBuf::from("/tmp/u.json"));
    }

    #[test]
    fn rejects_unparseable_number() {
        let err = BotConfig::from_lookup(lookup(&[("ADMIN_PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("ADMIN_PORT"));
    }

    #[test]
    fn rejects_inverted_business_hours() {
        let result = BotConfig::from_lookup(lookup(&[
            ("BUSINESS_HOURS_START", "22"),
            ("BUSINESS_HOURS_END", "8"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn business_hours_are_inclusive() {
        let config = ReminderConfig::default();
        assert!(config.within_business_hours(8));
        assert!(config.within_business_hours(22));
        assert!(!config.within_business_hours(7));
        assert!(!config.within_business_hours(23));
    }
}
