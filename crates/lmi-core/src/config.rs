use crate::app_config::{AppConfig, Environment, GoogleCredentials, LightcastCredentials};
use crate::sink::SharingMode;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
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
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// No variable is required. Missing API credentials leave the matching
/// collector or sink unavailable instead of failing startup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    // Blank values are treated the same as unset ones.
    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
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

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got '{other}'"))),
        }
    };

    let env = parse_environment(&or_default("LMI_ENV", "development"))?;
    let bind_addr = parse_addr("LMI_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("LMI_LOG_LEVEL", "info");

    let http_timeout_secs = parse_u64("LMI_HTTP_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("LMI_USER_AGENT", "lmi/0.1 (+labor-market-intelligence)");
    let http_max_retries = parse_u32("LMI_HTTP_MAX_RETRIES", "3")?;
    let retry_backoff_base_ms = parse_u64("LMI_RETRY_BACKOFF_BASE_MS", "1000")?;
    let lightcast_request_delay_ms = parse_u64("LMI_LIGHTCAST_REQUEST_DELAY_MS", "250")?;

    let default_sharing_mode = or_default("LMI_DEFAULT_SHARING_MODE", "restricted")
        .parse::<SharingMode>()
        .map_err(|reason| invalid("LMI_DEFAULT_SHARING_MODE", reason))?;
    let notify_on_share = parse_bool("LMI_NOTIFY_ON_SHARE", "false")?;

    let lightcast = match (
        optional("LIGHTCAST_CLIENT_ID"),
        optional("LIGHTCAST_CLIENT_SECRET"),
    ) {
        (Some(client_id), Some(client_secret)) => Some(LightcastCredentials {
            client_id,
            client_secret,
        }),
        _ => None,
    };

    let google = match (
        optional("GOOGLE_OAUTH_CLIENT_ID"),
        optional("GOOGLE_OAUTH_CLIENT_SECRET"),
        optional("GOOGLE_OAUTH_REFRESH_TOKEN"),
    ) {
        (Some(client_id), Some(client_secret), Some(refresh_token)) => Some(GoogleCredentials {
            client_id,
            client_secret,
            refresh_token,
        }),
        _ => None,
    };

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        http_timeout_secs,
        user_agent,
        http_max_retries,
        retry_backoff_base_ms,
        lightcast_request_delay_ms,
        default_sharing_mode,
        notify_on_share,
        serpapi_key: optional("SERPAPI_KEY"),
        bls_api_key: optional("BLS_API_KEY"),
        lightcast,
        google,
        google_drive_folder_id: optional("GOOGLE_DRIVE_FOLDER_ID"),
    })
}

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "LMI_ENV".to_string(),
            reason: format!("expected development, test, or production; got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
