//! Static configuration for the gate.
//!
//! Runtime auto-lock preferences live in [`crate::inactivity::AutoLockPreferences`];
//! this only carries the compiled-in defaults and their environment overrides.

use std::time::Duration;

use crate::error::ConfigError;

/// Default throttle interval for the "still active" heartbeat.
const DEFAULT_HEARTBEAT_MS: u64 = 1_000;

/// Shortest pairing token accepted before any round trip.
const DEFAULT_MIN_TOKEN_LEN: usize = 10;

/// Auto-lock timeout used until the settings store says otherwise (5 minutes).
const DEFAULT_AUTO_LOCK_TIMEOUT_MS: u64 = 300_000;

const HEARTBEAT_ENV: &str = "COMPANION_GATE_HEARTBEAT_MS";
const MIN_TOKEN_LEN_ENV: &str = "COMPANION_GATE_MIN_TOKEN_LEN";
const AUTO_LOCK_ENABLED_ENV: &str = "COMPANION_GATE_AUTO_LOCK_ENABLED";
const AUTO_LOCK_TIMEOUT_ENV: &str = "COMPANION_GATE_AUTO_LOCK_TIMEOUT_MS";

/// Gate configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    /// Minimum spacing between "still active" signals to the background.
    pub heartbeat_interval: Duration,
    /// Minimum trimmed length of a pairing token.
    pub min_token_len: usize,
    /// Auto-lock enabled flag used when the store has no value.
    pub default_auto_lock_enabled: bool,
    /// Auto-lock timeout used when the store has no value. `None` = never.
    pub default_auto_lock_timeout: Option<Duration>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(DEFAULT_HEARTBEAT_MS),
            min_token_len: DEFAULT_MIN_TOKEN_LEN,
            default_auto_lock_enabled: true,
            default_auto_lock_timeout: Some(Duration::from_millis(DEFAULT_AUTO_LOCK_TIMEOUT_MS)),
        }
    }
}

impl GateConfig {
    /// Load configuration from the environment, honoring a `.env` file if present.
    ///
    /// Unset variables keep their defaults; set but malformed ones are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(HEARTBEAT_ENV) {
            let ms = parse_nonzero(HEARTBEAT_ENV, &raw)?;
            config.heartbeat_interval = Duration::from_millis(ms);
        }

        if let Some(raw) = lookup(MIN_TOKEN_LEN_ENV) {
            let len = parse_nonzero(MIN_TOKEN_LEN_ENV, &raw)?;
            config.min_token_len = usize::try_from(len).map_err(|_| ConfigError::InvalidValue {
                key: MIN_TOKEN_LEN_ENV.to_string(),
                message: format!("{len} does not fit in usize"),
            })?;
        }

        if let Some(raw) = lookup(AUTO_LOCK_ENABLED_ENV) {
            config.default_auto_lock_enabled = match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                other => {
                    return Err(ConfigError::InvalidValue {
                        key: AUTO_LOCK_ENABLED_ENV.to_string(),
                        message: format!("expected a boolean, got '{other}'"),
                    });
                }
            };
        }

        if let Some(raw) = lookup(AUTO_LOCK_TIMEOUT_ENV) {
            config.default_auto_lock_timeout = if raw.trim().eq_ignore_ascii_case("never") {
                None
            } else {
                Some(Duration::from_millis(parse_u64(AUTO_LOCK_TIMEOUT_ENV, &raw)?))
            };
        }

        Ok(config)
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}': {e}"),
        })
}

fn parse_nonzero(key: &str, raw: &str) -> Result<u64, ConfigError> {
    match parse_u64(key, raw)? {
        0 => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be greater than zero".to_string(),
        }),
        value => Ok(value),
    }
}
