// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Taskchat configuration system.

use taskchat_config::diagnostic::ConfigError;
use taskchat_config::model::TaskchatConfig;
use taskchat_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[service]
name = "chat-eu"
log_level = "debug"

[server]
host = "0.0.0.0"
port = 4100
cors_origin = "https://app.example.com"
rate_limit_requests = 20
rate_limit_window_secs = 60

[auth]
jwt_secret = "s3cret"
jwt_issuer = "campus-auth"
timeout_secs = 2

[tasks]
base_url = "http://tasks.internal:8082"
service_token = "svc"

[storage]
database_path = "/tmp/chat.db"
wal_mode = false

[chat]
max_message_chars = 500
backlog_limit = 20
default_page_size = 25
max_page_size = 50
typing_timeout_ms = 1500

[presence]
reap_interval_secs = 60
stale_after_hours = 12

[client]
url = "wss://chat.example.com/ws"
handshake_timeout_secs = 3
max_reconnect_attempts = 2
reconnect_delay_ms = 250
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.name, "chat-eu");
    assert_eq!(config.server.port, 4100);
    assert_eq!(
        config.server.cors_origin.as_deref(),
        Some("https://app.example.com")
    );
    assert_eq!(config.server.rate_limit_requests, 20);
    assert_eq!(config.server.rate_limit_window_secs, 60);
    assert_eq!(config.auth.jwt_secret.as_deref(), Some("s3cret"));
    assert_eq!(config.auth.jwt_issuer.as_deref(), Some("campus-auth"));
    assert_eq!(config.tasks.service_token.as_deref(), Some("svc"));
    assert!(!config.storage.wal_mode);
    assert_eq!(config.chat.max_message_chars, 500);
    assert_eq!(config.chat.typing_timeout_ms, 1500);
    assert_eq!(config.presence.stale_after_hours, 12);
    assert_eq!(config.client.max_reconnect_attempts, 2);
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    assert_eq!(config.server.port, 3001);
    assert_eq!(config.server.rate_limit_requests, 100);
    assert_eq!(config.server.rate_limit_window_secs, 900);
    assert_eq!(config.chat.max_message_chars, 2000);
    assert_eq!(config.chat.backlog_limit, 50);
    assert_eq!(config.chat.typing_timeout_ms, 3000);
    assert_eq!(config.client.handshake_timeout_secs, 10);
    assert_eq!(config.client.max_reconnect_attempts, 5);
    assert_eq!(config.client.reconnect_delay_ms, 1000);
    assert_eq!(config.presence.stale_after_hours, 24);
    assert!(config.auth.jwt_secret.is_none());
}

#[test]
fn unknown_key_gets_a_suggestion() {
    let toml = r#"
[chat]
backlog_limt = 10
"#;
    let errors = load_and_validate_str(toml).expect_err("should reject unknown field");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "backlog_limt");
            assert_eq!(suggestion.as_deref(), Some("backlog_limit"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let toml = r#"
[telegram]
bot_token = "abc"
"#;
    assert!(load_config_from_str(toml).is_err());
    let errors = load_and_validate_str(toml).unwrap_err();
    match &errors[0] {
        ConfigError::UnknownKey { key, location, span, .. } => {
            assert_eq!(key, "telegram");
            assert_eq!(location, "the top level");
            assert_eq!(span.map(|s| s.offset()), toml.find("telegram"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn key_in_the_wrong_section_names_its_home() {
    use miette::Diagnostic;

    let errors = load_and_validate_str("[server]
typing_timeout_ms = 10
").unwrap_err();
    let help = errors[0].help().expect("should have help text").to_string();
    assert_eq!(help, "`typing_timeout_ms` belongs in [chat]");
}

#[test]
fn wrong_type_is_rejected() {
    let toml = r#"
[server]
port = "not-a-number"
"#;
    let errors = load_and_validate_str(toml).expect_err("should reject wrong type");
    let rendered = errors[0].to_string();
    assert!(
        matches!(errors[0], ConfigError::InvalidType { .. }) || rendered.contains("port"),
        "unexpected error: {rendered}"
    );
}

#[test]
fn semantic_validation_runs_after_parsing() {
    let toml = r#"
[chat]
default_page_size = 80
max_page_size = 40
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    match &errors[0] {
        ConfigError::InvalidValue { key, span, .. } => {
            assert_eq!(key, "chat.default_page_size");
            let offset = toml.find("default_page_size").unwrap();
            assert_eq!(span.map(|s| s.offset()), Some(offset));
        }
        other => panic!("expected InvalidValue, got {other:?}"),
    }
}

#[test]
fn file_errors_suggest_corrections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskchat.toml");
    std::fs::write(&path, "[server]\nhots = \"0.0.0.0\"\n").unwrap();

    let errors = load_and_validate_path(&path).expect_err("should reject unknown key");
    match &errors[0] {
        ConfigError::UnknownKey { suggestion, .. } => {
            assert_eq!(suggestion.as_deref(), Some("host"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_key_renders_with_help() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let errors = load_and_validate_str("[client]\nurll = \"ws://x\"\n").unwrap_err();
    let help = errors[0].help().expect("should have help text").to_string();
    assert!(help.contains("did you mean `url`"), "help was: {help}");

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &errors[0])
        .expect("should render without error");
    assert!(buf.contains("urll"));
}

#[test]
fn default_config_serializes_back_to_toml() {
    let rendered = toml::to_string(&TaskchatConfig::default()).expect("should serialize");
    assert!(rendered.contains("[chat]"));
    let reparsed = load_config_from_str(&rendered).expect("rendered TOML should load");
    assert_eq!(reparsed.chat.max_page_size, 100);
}
