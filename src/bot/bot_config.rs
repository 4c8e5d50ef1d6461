// Runtime configuration, read from the environment (a `.env` file is loaded first by main).

use chrono_tz::Tz;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_name: String,
    pub owner_id: String,
    pub owner_name: String,
    pub default_prefix: String,
    pub data_dir: PathBuf,
    pub timezone: Tz,
    pub home_country_code: String,
    pub max_warnings: usize,
    /// Upper bound on any single call to the messaging gateway.
    pub action_timeout: Duration,
    pub rental_check_interval: Duration,
    pub rental_warning_window: chrono::Duration,
    pub rental_remind_once: bool,
    pub gateway_url: String,
    pub gateway_token: Option<String>,
    pub gateway_poll_interval: Duration,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let owner_id = required("BOT_OWNER_NUMBER")?;
        let gateway_url = required("GATEWAY_URL")?;

        let timezone = match get("BOT_TIMEZONE") {
            Some(name) => name.parse::<Tz>().map_err(|e| ConfigError::Invalid {
                key: "BOT_TIMEZONE",
                value: name.clone(),
                reason: e.to_string(),
            })?,
            None => chrono_tz::America::Manaus,
        };

        let max_warnings: usize = parse_or(&get, "BOT_MAX_WARNINGS", 3)?;
        if max_warnings == 0 {
            return Err(ConfigError::Invalid {
                key: "BOT_MAX_WARNINGS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let warning_hours: i64 = parse_or(&get, "RENTAL_WARNING_HOURS", 72)?;
        let rental_warning_window = chrono::Duration::try_hours(warning_hours)
            .filter(|window| *window >= chrono::Duration::zero())
            .ok_or_else(|| ConfigError::Invalid {
                key: "RENTAL_WARNING_HOURS",
                value: warning_hours.to_string(),
                reason: "must be a non-negative number of hours in range".to_string(),
            })?;

        Ok(Self {
            bot_name: get("BOT_NAME").unwrap_or_else(|| "OdinBOT".to_string()),
            owner_name: get("BOT_OWNER_NAME").unwrap_or_else(|| owner_id.clone()),
            owner_id,
            default_prefix: get("BOT_PREFIX").unwrap_or_else(|| "#".to_string()),
            data_dir: PathBuf::from(get("BOT_DATA_DIR").unwrap_or_else(|| "data".to_string())),
            timezone,
            home_country_code: get("BOT_HOME_COUNTRY_CODE").unwrap_or_else(|| "55".to_string()),
            max_warnings,
            action_timeout: Duration::from_secs(parse_or(&get, "BOT_ACTION_TIMEOUT_SECS", 15)?),
            rental_check_interval: Duration::from_secs(parse_or(
                &get,
                "RENTAL_CHECK_INTERVAL_SECS",
                3600,
            )?),
            rental_warning_window,
            rental_remind_once: parse_or(&get, "RENTAL_REMIND_ONCE", false)?,
            gateway_url,
            gateway_token: get("GATEWAY_TOKEN"),
            gateway_poll_interval: Duration::from_millis(parse_or(
                &get,
                "GATEWAY_POLL_INTERVAL_MS",
                1000,
            )?),
        })
    }
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
