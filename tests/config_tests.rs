// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::time::Duration;
use tempfile::TempDir;

use relay::chat::SessionConfig;
use relay::config::Settings;
use relay::error::RelayError;

#[test]
fn test_settings_default_values() {
    let settings = Settings::default();

    assert_eq!(settings.openai.api_key_env, "OPENAI_API_KEY");
    assert_eq!(settings.openai.base_url, "https://api.openai.com/v1");
    assert_eq!(settings.search.base_url, "https://api.tavily.com/search");
    assert_eq!(settings.search.max_results, 3);
    assert_eq!(settings.search.search_depth, "advanced");
    assert_eq!(settings.session.flush_interval_ms, 1000);
    assert_eq!(settings.session.cancel_attempts, 2);
    assert!(!settings.session.strict_tools);
    assert!(settings.session.idle_timeout().is_none());
}

#[test]
fn test_settings_api_key_priority() {
    // Use a custom env var name to avoid test pollution
    let mut settings = Settings::default();
    settings.search.api_key_env = "RELAY_TEST_SEARCH_KEY_PRIORITY".to_string();
    settings.search.api_key = Some("config-key".to_string());

    std::env::remove_var("RELAY_TEST_SEARCH_KEY_PRIORITY");
    assert_eq!(settings.get_search_api_key(), Some("config-key".to_string()));

    std::env::set_var("RELAY_TEST_SEARCH_KEY_PRIORITY", "env-key");
    assert_eq!(settings.get_search_api_key(), Some("env-key".to_string()));

    std::env::remove_var("RELAY_TEST_SEARCH_KEY_PRIORITY");
}

#[test]
fn test_load_missing_file_gives_defaults() {
    let dir = TempDir::new().unwrap();
    let settings = Settings::load_from(&dir.path().join("settings.json")).unwrap();
    assert_eq!(settings.search.max_results, 3);
}

#[test]
fn test_save_and_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("settings.json");

    let mut settings = Settings::default();
    settings.openai.assistant_id = Some("asst_1".to_string());
    settings.session.flush_interval_ms = 250;
    settings.session.strict_tools = true;
    settings.save_to(&path).unwrap();

    let loaded = Settings::load_from(&path).unwrap();
    assert_eq!(loaded.openai.assistant_id.as_deref(), Some("asst_1"));
    assert_eq!(loaded.session.flush_interval_ms, 250);
    assert!(loaded.session.strict_tools);
}

#[test]
fn test_save_preserves_unknown_keys() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{"webhook": {"port": 8080}, "session": {"flush_interval_ms": 500, "note": "keep"}}"#,
    )
    .unwrap();

    let mut settings = Settings::load_from(&path).unwrap();
    assert_eq!(settings.session.flush_interval_ms, 500);
    settings.session.cancel_attempts = 4;
    settings.save_to(&path).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["webhook"]["port"], 8080);
    assert_eq!(raw["session"]["note"], "keep");
    assert_eq!(raw["session"]["cancel_attempts"], 4);
}

#[test]
fn test_legacy_tavily_block_is_migrated() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{"tavily": {"api_key": "tv-legacy", "max_results": 6}}"#).unwrap();

    let settings = Settings::load_from(&path).unwrap();
    assert_eq!(settings.search.api_key.as_deref(), Some("tv-legacy"));
    assert_eq!(settings.search.max_results, 6);
}

#[test]
fn test_invalid_values_are_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{"session": {"flush_interval_ms": 0}}"#).unwrap();

    match Settings::load_from(&path) {
        Err(RelayError::Config(message)) => assert!(message.contains("flush_interval_ms")),
        other => panic!("expected config error, got {:?}", other),
    }
}

#[test]
fn test_corrupt_file_is_a_json_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(
        Settings::load_from(&path),
        Err(RelayError::Json(_))
    ));
}

#[test]
fn test_session_config_from_settings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{"session": {"flush_interval_ms": 200, "idle_timeout_secs": 30, "cancel_attempts": 3}}"#,
    )
    .unwrap();

    let settings = Settings::load_from(&path).unwrap();
    let config = SessionConfig::from_settings(&settings.session);
    assert_eq!(config.flush_interval, Duration::from_millis(200));
    assert_eq!(config.idle_timeout, Some(Duration::from_secs(30)));
    assert_eq!(config.cancel_attempts, 3);
}
