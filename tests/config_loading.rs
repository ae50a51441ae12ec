//! Integration test: configuration utilities
//!
//! Tests the bin_common path resolution together with loading the sample
//! configuration shipped in `config/`.

use cobra_rtm::bin_common::{load_config_from_env, ConfigType};
use cobra_rtm::cobra::CobraConfig;

#[test]
fn test_subscriber_config_default_path() {
    std::env::remove_var("COBRA_CONFIG_PATH");

    let config_path = load_config_from_env(ConfigType::Subscriber);
    assert_eq!(config_path.to_str().unwrap(), "config/cobra.yaml");
}

#[test]
fn test_custom_config() {
    let custom = ConfigType::Custom("custom/path.yaml".to_string());
    let config_path = load_config_from_env(custom);

    assert_eq!(config_path.to_str().unwrap(), "custom/path.yaml");
}

#[test]
fn test_config_type_env_var_name() {
    assert_eq!(ConfigType::Subscriber.env_var_name(), "COBRA_CONFIG_PATH");
}

#[test]
fn test_sample_config_parses_with_secret_override() {
    let yaml = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/config/cobra.yaml")).unwrap();

    let config = CobraConfig::from_yaml(&yaml, Some("secret".to_string())).unwrap();
    assert_eq!(config.channel, "sms_republished_events");
    assert_eq!(config.connection.rolesecret, "secret");
    assert_eq!(config.settings.reconnect_delay_ms, 1000);
    assert_eq!(config.connection.url().unwrap(), "ws://localhost:8765/v2?appkey=_health");
}

#[test]
fn test_sample_config_requires_secret() {
    let yaml = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/config/cobra.yaml")).unwrap();

    assert!(CobraConfig::from_yaml(&yaml, None).is_err());
}
