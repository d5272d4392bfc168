use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                                  (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Upper bound for every scheduling setting: one year.
pub const MAX_SCHEDULE_SECS: u64 = 365 * 24 * 60 * 60;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if any value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if any value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_positive_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        match parse_u64(var, default)? {
            0 => Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "must be greater than zero".to_string(),
            }),
            n => Ok(n),
        }
    };

    let at_most = |var: &str, value: u64| -> Result<u64, ConfigError> {
        if value > MAX_SCHEDULE_SECS {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: format!("must be at most {MAX_SCHEDULE_SECS} seconds"),
            });
        }
        Ok(value)
    };

    let env = parse_environment(&or_default("PRICEWATCH_ENV", "development"))?;
    let log_level = or_default("PRICEWATCH_LOG_LEVEL", "info");
    let state_path = PathBuf::from(or_default(
        "PRICEWATCH_STATE_PATH",
        "./pricewatch_state.json",
    ));

    let check_interval_secs = at_most(
        "PRICEWATCH_CHECK_INTERVAL_SECS",
        parse_positive_u64("PRICEWATCH_CHECK_INTERVAL_SECS", "3600")?,
    )?;
    let first_check_delay_secs = at_most(
        "PRICEWATCH_FIRST_CHECK_DELAY_SECS",
        parse_u64("PRICEWATCH_FIRST_CHECK_DELAY_SECS", "10")?,
    )?;
    let startup_jitter_secs = at_most(
        "PRICEWATCH_STARTUP_JITTER_SECS",
        parse_u64("PRICEWATCH_STARTUP_JITTER_SECS", "60")?,
    )?;
    let request_timeout_secs = parse_positive_u64("PRICEWATCH_REQUEST_TIMEOUT_SECS", "20")?;

    let user_agent = or_default("PRICEWATCH_USER_AGENT", DEFAULT_USER_AGENT);
    let currency_symbol = or_default("PRICEWATCH_CURRENCY_SYMBOL", "₹");
    let webhook_url = lookup("PRICEWATCH_WEBHOOK_URL")
        .ok()
        .filter(|s| !s.trim().is_empty());

    Ok(AppConfig {
        env,
        log_level,
        state_path,
        check_interval_secs,
        first_check_delay_secs,
        startup_jitter_secs,
        request_timeout_secs,
        user_agent,
        currency_symbol,
        webhook_url,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "production" => Ok(Environment::Production),
        "test" => Ok(Environment::Test),
        other => Err(ConfigError::InvalidEnvVar {
            var: "PRICEWATCH_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
