use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

const DEFAULT_ORACLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
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
/// Returns `ConfigError` if required env vars are missing or values are invalid.
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
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_positive_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let value = or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if value == 0 {
            return Err(invalid(var, "must be at least 1".to_string()));
        }
        Ok(value)
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("KANTOI_ENV", "development"))?;
    let bind_addr = parse_addr("KANTOI_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("KANTOI_LOG_LEVEL", "info");
    let weights_path = PathBuf::from(or_default("KANTOI_WEIGHTS_PATH", "./config/weights.yaml"));

    let oracle_api_key = lookup("GEMINI_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty());
    let oracle_base_url = or_default("KANTOI_ORACLE_BASE_URL", DEFAULT_ORACLE_BASE_URL)
        .trim_end_matches('/')
        .to_string();
    let oracle_model = or_default("KANTOI_ORACLE_MODEL", "gemini-2.0-flash");
    let oracle_request_timeout_secs = parse_u64("KANTOI_ORACLE_REQUEST_TIMEOUT_SECS", "30")?;
    let oracle_max_retries = parse_u32("KANTOI_ORACLE_MAX_RETRIES", "3")?;
    let oracle_retry_backoff_base_ms = parse_u64("KANTOI_ORACLE_RETRY_BACKOFF_BASE_MS", "1000")?;

    let classify_max_concurrent = parse_positive_usize("KANTOI_CLASSIFY_MAX_CONCURRENT", "4")?;
    let classify_batch_size = parse_positive_usize("KANTOI_CLASSIFY_BATCH_SIZE", "100")?;
    let classify_max_attempts = {
        let raw = parse_u32("KANTOI_CLASSIFY_MAX_ATTEMPTS", "3")?;
        i32::try_from(raw)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| invalid("KANTOI_CLASSIFY_MAX_ATTEMPTS", format!("out of range: {raw}")))?
    };
    let brief_evidence_size = parse_positive_usize("KANTOI_BRIEF_EVIDENCE_SIZE", "8")?;

    let score_cron = or_default("KANTOI_SCORE_CRON", "0 */15 * * * *");
    let brief_cron = or_default("KANTOI_BRIEF_CRON", "0 0 6 * * *");

    let db_max_connections = parse_u32("KANTOI_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("KANTOI_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("KANTOI_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        weights_path,
        oracle_api_key,
        oracle_base_url,
        oracle_model,
        oracle_request_timeout_secs,
        oracle_max_retries,
        oracle_retry_backoff_base_ms,
        classify_max_concurrent,
        classify_batch_size,
        classify_max_attempts,
        brief_evidence_size,
        score_cron,
        brief_cron,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "KANTOI_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}
