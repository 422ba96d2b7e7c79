use crate::config::{ENV_API_URL, ENV_ENABLED, RealtimeConfig};
use crate::error::config::ConfigError;

use serial_test::serial;
use tempfile::TempDir;

/// **VALUE**: A missing config file means defaults, not an error.
///
/// **WHY THIS MATTERS**: First launch has no `realtime.json`; failing there
/// would make the console unusable out of the box.
#[test]
fn given_empty_dir_when_loaded_then_defaults_returned() {
    // GIVEN: An empty config dir
    let dir = TempDir::new().unwrap();

    // WHEN: Loading
    let config = RealtimeConfig::load(dir.path()).unwrap();

    // THEN: Defaults
    assert_eq!(config.api.base_url, "http://localhost:8080");
    assert_eq!(config.realtime.ws_path, "/ws");
    assert!(config.realtime.enabled);
    assert_eq!(config.realtime.reconnect_delay_ms, 3000);
    assert_eq!(config.realtime.max_reconnect_attempts, 5);
    assert!(!config.realtime.topics.is_empty());
}

/// **VALUE**: A saved config loads back, and the temp file is gone.
#[test]
fn given_modified_config_when_saved_then_loaded_with_changes_and_no_temp_file() {
    // GIVEN: A config pointing at another host with realtime disabled
    let dir = TempDir::new().unwrap();
    let mut config = RealtimeConfig::default();
    config.api.base_url = "https://logistics.example.com".to_string();
    config.realtime.enabled = false;

    // WHEN: Saving then loading
    config.save(dir.path()).unwrap();
    let loaded = RealtimeConfig::load(dir.path()).unwrap();

    // THEN: Changes survive, atomic write left nothing behind
    assert_eq!(loaded.api.base_url, "https://logistics.example.com");
    assert!(!loaded.realtime.enabled);
    assert!(!dir.path().join("realtime.json.tmp").exists());
}

/// **VALUE**: Partial files fill in missing fields with defaults.
#[test]
fn given_partial_json_when_loaded_then_missing_fields_defaulted() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("realtime.json"),
        r#"{ "realtime": { "topics": ["/topic/only"] } }"#,
    )
    .unwrap();

    let config = RealtimeConfig::load(dir.path()).unwrap();

    assert_eq!(config.realtime.topics, vec!["/topic/only".to_string()]);
    assert_eq!(config.realtime.ws_path, "/ws");
    assert_eq!(config.version, 1);
}

#[test]
fn given_corrupt_json_when_loaded_then_parse_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("realtime.json"), "{ not json").unwrap();

    let result = RealtimeConfig::load(dir.path());

    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

/// **VALUE**: Invalid values are rejected before they reach the transport.
#[test]
fn given_invalid_values_when_validated_then_validation_error() {
    let mut bad_path = RealtimeConfig::default();
    bad_path.realtime.ws_path = "ws".to_string();

    let mut bad_scheme = RealtimeConfig::default();
    bad_scheme.api.base_url = "ftp://host".to_string();

    let mut no_topics = RealtimeConfig::default();
    no_topics.realtime.topics.clear();

    let mut zero_delay = RealtimeConfig::default();
    zero_delay.realtime.reconnect_delay_ms = 0;

    let mut future_version = RealtimeConfig::default();
    future_version.version = 99;

    for config in [bad_path, bad_scheme, no_topics, zero_delay, future_version] {
        let error = config.validate().unwrap_err();
        assert!(error.is_validation(), "Expected validation error, got {error}");
    }
}

/// **VALUE**: Environment variables override the file.
#[test]
#[serial]
fn given_env_overrides_when_applied_then_config_updated() {
    // GIVEN: Both override variables set
    unsafe {
        std::env::set_var(ENV_API_URL, "http://staging:9090");
        std::env::set_var(ENV_ENABLED, "false");
    }
    let mut config = RealtimeConfig::default();

    // WHEN: Applying overrides
    let result = config.apply_env_overrides();

    unsafe {
        std::env::remove_var(ENV_API_URL);
        std::env::remove_var(ENV_ENABLED);
    }

    // THEN: Values replaced
    result.unwrap();
    assert_eq!(config.api.base_url, "http://staging:9090");
    assert!(!config.realtime.enabled);
}

#[test]
#[serial]
fn given_unparseable_enabled_flag_when_applied_then_env_error() {
    unsafe {
        std::env::set_var(ENV_ENABLED, "maybe");
    }
    let mut config = RealtimeConfig::default();

    let result = config.apply_env_overrides();

    unsafe {
        std::env::remove_var(ENV_ENABLED);
    }

    assert!(matches!(result, Err(ConfigError::EnvOverride { .. })));
}
