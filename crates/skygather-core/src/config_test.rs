use std::collections::HashMap;

use super::build_app_config;
use crate::ConfigError;

fn lookup_from<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, std::env::VarError> + 'a {
    move |key: &str| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(std::env::VarError::NotPresent)
    }
}

fn minimal_env() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("SKYGATHER_IDENTIFIER", "collector.bsky.social"),
        ("SKYGATHER_APP_PASSWORD", "xxxx-xxxx-xxxx-xxxx"),
    ])
}

#[test]
fn builds_with_defaults_from_minimal_env() {
    let env = minimal_env();
    let config = build_app_config(lookup_from(&env)).expect("minimal env should build");

    assert_eq!(config.identifier, "collector.bsky.social");
    assert_eq!(config.service_url, "https://bsky.social");
    assert_eq!(config.data_dir, std::path::PathBuf::from("data"));
    assert!(config.topics_path.is_none());
    assert_eq!(config.request_timeout_secs, 30);
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.inter_page_delay_ms, 500);
    assert_eq!(config.inter_query_delay_ms, 1000);
    assert_eq!(config.flush_max_buffered, 25);
    assert_eq!(config.flush_max_interval_secs, 120);
}

#[test]
fn missing_identifier_is_an_error() {
    let mut env = minimal_env();
    env.remove("SKYGATHER_IDENTIFIER");

    let err = build_app_config(lookup_from(&env)).unwrap_err();
    assert!(
        matches!(err, ConfigError::MissingEnvVar(ref var) if var == "SKYGATHER_IDENTIFIER"),
        "expected MissingEnvVar, got: {err:?}"
    );
}

#[test]
fn missing_app_password_is_an_error() {
    let mut env = minimal_env();
    env.remove("SKYGATHER_APP_PASSWORD");

    let err = build_app_config(lookup_from(&env)).unwrap_err();
    assert!(matches!(err, ConfigError::MissingEnvVar(_)));
}

#[test]
fn invalid_numeric_value_is_an_error() {
    let mut env = minimal_env();
    env.insert("SKYGATHER_MAX_RETRIES", "lots");

    let err = build_app_config(lookup_from(&env)).unwrap_err();
    assert!(
        matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "SKYGATHER_MAX_RETRIES"),
        "expected InvalidEnvVar, got: {err:?}"
    );
}

#[test]
fn overrides_are_respected() {
    let mut env = minimal_env();
    env.insert("SKYGATHER_SERVICE_URL", "https://pds.example.org");
    env.insert("SKYGATHER_DATA_DIR", "/var/lib/skygather");
    env.insert("SKYGATHER_TOPICS_PATH", "config/topics.yaml");
    env.insert("SKYGATHER_FLUSH_MAX_BUFFERED", "100");

    let config = build_app_config(lookup_from(&env)).expect("env should build");
    assert_eq!(config.service_url, "https://pds.example.org");
    assert_eq!(
        config.data_dir,
        std::path::PathBuf::from("/var/lib/skygather")
    );
    assert_eq!(
        config.topics_path,
        Some(std::path::PathBuf::from("config/topics.yaml"))
    );
    assert_eq!(config.flush_max_buffered, 100);
}

#[test]
fn debug_redacts_the_app_password() {
    let env = minimal_env();
    let config = build_app_config(lookup_from(&env)).expect("env should build");
    let rendered = format!("{config:?}");
    assert!(!rendered.contains("xxxx-xxxx"));
    assert!(rendered.contains("[redacted]"));
}
