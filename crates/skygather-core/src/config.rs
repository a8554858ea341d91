use crate::app_config::AppConfig;
use crate::ConfigError;

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
/// Unlike [`load_app_config`], this does NOT load `.env` files, which keeps tests hermetic
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so it can be tested with a pure `HashMap` lookup without touching process environment.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    Ok(AppConfig {
        identifier: require("SKYGATHER_IDENTIFIER")?,
        app_password: require("SKYGATHER_APP_PASSWORD")?,
        service_url: or_default("SKYGATHER_SERVICE_URL", "https://bsky.social"),
        data_dir: PathBuf::from(or_default("SKYGATHER_DATA_DIR", "data")),
        topics_path: lookup("SKYGATHER_TOPICS_PATH").ok().map(PathBuf::from),
        log_level: or_default("SKYGATHER_LOG_LEVEL", "info"),
        request_timeout_secs: parse_u64("SKYGATHER_REQUEST_TIMEOUT_SECS", "30")?,
        user_agent: or_default("SKYGATHER_USER_AGENT", "skygather/0.1"),
        max_retries: parse_u32("SKYGATHER_MAX_RETRIES", "3")?,
        retry_backoff_base_ms: parse_u64("SKYGATHER_RETRY_BACKOFF_BASE_MS", "1000")?,
        inter_page_delay_ms: parse_u64("SKYGATHER_INTER_PAGE_DELAY_MS", "500")?,
        inter_query_delay_ms: parse_u64("SKYGATHER_INTER_QUERY_DELAY_MS", "1000")?,
        flush_max_buffered: parse_usize("SKYGATHER_FLUSH_MAX_BUFFERED", "25")?,
        flush_max_interval_secs: parse_u64("SKYGATHER_FLUSH_MAX_INTERVAL_SECS", "120")?,
        stream_poll_interval_secs: parse_u64("SKYGATHER_STREAM_POLL_INTERVAL_SECS", "30")?,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
