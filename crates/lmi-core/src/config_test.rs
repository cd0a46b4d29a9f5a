use std::collections::HashMap;
use std::env::VarError;

use super::*;

fn lookup_from_map<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    }
}

fn full_env<'a>() -> HashMap<&'a str, &'a str> {
    let mut m = HashMap::new();
    m.insert("SERPAPI_KEY", "serp-secret");
    m.insert("LIGHTCAST_CLIENT_ID", "lc-id");
    m.insert("LIGHTCAST_CLIENT_SECRET", "lc-secret");
    m.insert("GOOGLE_OAUTH_CLIENT_ID", "g-id");
    m.insert("GOOGLE_OAUTH_CLIENT_SECRET", "g-secret");
    m.insert("GOOGLE_OAUTH_REFRESH_TOKEN", "g-refresh");
    m
}

#[test]
fn parse_environment_known_values() {
    assert_eq!(
        parse_environment("development").unwrap(),
        Environment::Development
    );
    assert_eq!(parse_environment("test").unwrap(), Environment::Test);
    assert_eq!(
        parse_environment("production").unwrap(),
        Environment::Production
    );
}

#[test]
fn parse_environment_unknown_fails() {
    let err = parse_environment("staging").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "LMI_ENV"));
}

#[test]
fn build_app_config_succeeds_with_empty_env() {
    let map: HashMap<&str, &str> = HashMap::new();
    let config = build_app_config(lookup_from_map(&map)).expect("empty env is valid");
    assert_eq!(config.env, Environment::Development);
    assert_eq!(config.bind_addr.to_string(), "0.0.0.0:3000");
    assert_eq!(config.http_timeout_secs, 30);
    assert_eq!(config.http_max_retries, 3);
    assert_eq!(config.retry_backoff_base_ms, 1000);
    assert_eq!(config.lightcast_request_delay_ms, 250);
    assert_eq!(config.default_sharing_mode, SharingMode::Restricted);
    assert!(!config.notify_on_share);
    assert!(config.serpapi_key.is_none());
    assert!(config.lightcast.is_none());
    assert!(config.google.is_none());
}

#[test]
fn build_app_config_reads_credentials() {
    let map = full_env();
    let config = build_app_config(lookup_from_map(&map)).expect("valid config");
    assert_eq!(config.serpapi_key.as_deref(), Some("serp-secret"));
    let lightcast = config.lightcast.expect("lightcast credentials");
    assert_eq!(lightcast.client_id, "lc-id");
    let google = config.google.expect("google credentials");
    assert_eq!(google.refresh_token, "g-refresh");
}

#[test]
fn build_app_config_requires_both_lightcast_halves() {
    let mut map = full_env();
    map.remove("LIGHTCAST_CLIENT_SECRET");
    let config = build_app_config(lookup_from_map(&map)).expect("valid config");
    assert!(config.lightcast.is_none());
}

#[test]
fn build_app_config_treats_blank_values_as_unset() {
    let mut map = full_env();
    map.insert("SERPAPI_KEY", "   ");
    let config = build_app_config(lookup_from_map(&map)).expect("valid config");
    assert!(config.serpapi_key.is_none());
}

#[test]
fn build_app_config_rejects_invalid_timeout() {
    let mut map = full_env();
    map.insert("LMI_HTTP_TIMEOUT_SECS", "soon");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "LMI_HTTP_TIMEOUT_SECS"),
        "expected InvalidEnvVar(LMI_HTTP_TIMEOUT_SECS), got: {result:?}"
    );
}

#[test]
fn build_app_config_rejects_unknown_sharing_mode() {
    let mut map = full_env();
    map.insert("LMI_DEFAULT_SHARING_MODE", "public");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "LMI_DEFAULT_SHARING_MODE"),
        "expected InvalidEnvVar(LMI_DEFAULT_SHARING_MODE), got: {result:?}"
    );
}

#[test]
fn build_app_config_parses_notify_flag() {
    let mut map = full_env();
    map.insert("LMI_NOTIFY_ON_SHARE", "yes");
    let config = build_app_config(lookup_from_map(&map)).expect("valid config");
    assert!(config.notify_on_share);
}

#[test]
fn debug_output_redacts_secrets() {
    let map = full_env();
    let config = build_app_config(lookup_from_map(&map)).expect("valid config");
    let rendered = format!("{config:?}");
    assert!(!rendered.contains("serp-secret"));
    assert!(!rendered.contains("lc-secret"));
    assert!(!rendered.contains("g-refresh"));
    assert!(rendered.contains("[redacted]"));
}
