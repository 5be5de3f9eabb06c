use std::{env, fmt, time::Duration};

use thiserror::Error;

const DISCORD_BOT_TOKEN: &str = "DISCORD_BOT_TOKEN";
const ALPHA_VANTAGE_API_KEY: &str = "ALPHA_VANTAGE_API_KEY";
const UPDATE_INTERVAL_MINUTES: &str = "UPDATE_INTERVAL_MINUTES";
const TICKER_SYMBOL: &str = "TICKER_SYMBOL";
const LOG_FILE: &str = "LOG_FILE";

const DEFAULT_API_KEY: &str = "demo";
const DEFAULT_INTERVAL_MINUTES: u64 = 5;
const DEFAULT_SYMBOL: &str = "MSTR";
const DEFAULT_LOG_FILE: &str = "bot.log";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),
    #[error("{name} must be a whole number of minutes (at least 1), got {value:?}")]
    InvalidInterval { name: &'static str, value: String },
}

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub alpha_vantage_key: String,
    pub update_interval: Duration,
    pub symbol: String,
    pub log_file: String,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Config::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let read = |name: &str| lookup(name).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let discord_token = read(DISCORD_BOT_TOKEN).ok_or(ConfigError::Missing(DISCORD_BOT_TOKEN))?;
        let update_interval = match read(UPDATE_INTERVAL_MINUTES) {
            None => Duration::from_secs(DEFAULT_INTERVAL_MINUTES * 60),
            Some(value) => value
                .parse::<u64>()
                .ok()
                .filter(|m| *m >= 1)
                .and_then(|m| m.checked_mul(60))
                .map(Duration::from_secs)
                .ok_or(ConfigError::InvalidInterval {
                    name: UPDATE_INTERVAL_MINUTES,
                    value,
                })?,
        };
        Ok(Config {
            discord_token,
            alpha_vantage_key: read(ALPHA_VANTAGE_API_KEY).unwrap_or_else(|| DEFAULT_API_KEY.to_owned()),
            update_interval,
            symbol: read(TICKER_SYMBOL)
                .map(|s| s.to_ascii_uppercase())
                .unwrap_or_else(|| DEFAULT_SYMBOL.to_owned()),
            log_file: read(LOG_FILE).unwrap_or_else(|| DEFAULT_LOG_FILE.to_owned()),
        })
    }

    pub fn interval_minutes(&self) -> u64 {
        self.update_interval.as_secs() / 60
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field(
                "alpha_vantage_key",
                if self.alpha_vantage_key == DEFAULT_API_KEY {
                    &DEFAULT_API_KEY
                } else {
                    &"[REDACTED]"
                },
            )
            .field("update_interval", &self.update_interval)
            .field("symbol", &self.symbol)
            .field("log_file", &self.log_file)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let config = config(&[(DISCORD_BOT_TOKEN, "token")]).unwrap();
        assert_eq!(config.discord_token, "token");
        assert_eq!(config.alpha_vantage_key, "demo");
        assert_eq!(config.update_interval, Duration::from_secs(300));
        assert_eq!(config.interval_minutes(), 5);
        assert_eq!(config.symbol, "MSTR");
        assert_eq!(config.log_file, "bot.log");
    }

    #[test]
    fn missing_or_blank_token_is_an_error() {
        assert_eq!(
            config(&[]).unwrap_err(),
            ConfigError::Missing(DISCORD_BOT_TOKEN)
        );
        assert_eq!(
            config(&[(DISCORD_BOT_TOKEN, "  ")]).unwrap_err(),
            ConfigError::Missing(DISCORD_BOT_TOKEN)
        );
    }

    #[test]
    fn overrides_are_read() {
        let config = config(&[
            (DISCORD_BOT_TOKEN, "token"),
            (ALPHA_VANTAGE_API_KEY, "secret"),
            (UPDATE_INTERVAL_MINUTES, "15"),
            (TICKER_SYMBOL, "coin"),
            (LOG_FILE, "/tmp/ticker.log"),
        ])
        .unwrap();
        assert_eq!(config.alpha_vantage_key, "secret");
        assert_eq!(config.interval_minutes(), 15);
        assert_eq!(config.symbol, "COIN");
        assert_eq!(config.log_file, "/tmp/ticker.log");
    }

    #[test]
    fn bad_interval_is_rejected() {
        for value in ["five", "0", "-3", "2.5", "307445734561825861"] {
            assert!(matches!(
                config(&[(DISCORD_BOT_TOKEN, "token"), (UPDATE_INTERVAL_MINUTES, value)]),
                Err(ConfigError::InvalidInterval { .. })
            ));
        }
    }

    #[test]
    fn largest_representable_interval_is_accepted() {
        let minutes = (u64::MAX / 60).to_string();
        let config = config(&[(DISCORD_BOT_TOKEN, "token"), (UPDATE_INTERVAL_MINUTES, &minutes)]).unwrap();
        assert_eq!(config.interval_minutes(), u64::MAX / 60);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = config(&[
            (DISCORD_BOT_TOKEN, "very-secret-token"),
            (ALPHA_VANTAGE_API_KEY, "also-secret"),
        ])
        .unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("very-secret-token"));
        assert!(!printed.contains("also-secret"));
    }
}
