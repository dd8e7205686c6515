// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::{MESSAGE_CHARS_CEILING, TaskchatConfig};

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &TaskchatConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let server = &config.server;
    if server.host.trim().is_empty() {
        errors.push(invalid("server.host", "must not be empty"));
    }
    if server.rate_limit_requests > 0 && server.rate_limit_window_secs == 0 {
        errors.push(invalid(
            "server.rate_limit_window_secs",
            "must be greater than 0 while rate_limit_requests is set",
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(invalid("storage.database_path", "must not be empty"));
    }

    let chat = &config.chat;
    if chat.max_message_chars == 0 || chat.max_message_chars > MESSAGE_CHARS_CEILING {
        errors.push(invalid(
            "chat.max_message_chars",
            format!(
                "must be between 1 and {MESSAGE_CHARS_CEILING}, got {}",
                chat.max_message_chars
            ),
        ));
    }
    if chat.typing_timeout_ms == 0 {
        errors.push(invalid("chat.typing_timeout_ms", "must be greater than 0"));
    }
    if chat.backlog_limit == 0 {
        errors.push(invalid("chat.backlog_limit", "must be greater than 0"));
    }
    if chat.default_page_size == 0 {
        errors.push(invalid("chat.default_page_size", "must be greater than 0"));
    }
    if chat.max_page_size == 0 {
        errors.push(invalid("chat.max_page_size", "must be greater than 0"));
    } else if chat.default_page_size > chat.max_page_size {
        errors.push(invalid(
            "chat.default_page_size",
            format!(
                "{} exceeds chat.max_page_size ({})",
                chat.default_page_size, chat.max_page_size
            ),
        ));
    }

    if config.presence.reap_interval_secs == 0 {
        errors.push(invalid("presence.reap_interval_secs", "must be greater than 0"));
    }

    if config.client.handshake_timeout_secs == 0 {
        errors.push(invalid("client.handshake_timeout_secs", "must be greater than 0"));
    }
    if !has_scheme(&config.client.url, &["ws://", "wss://"]) {
        errors.push(invalid(
            "client.url",
            format!("`{}` must start with ws:// or wss://", config.client.url),
        ));
    }

    if !has_scheme(&config.tasks.base_url, &["http://", "https://"]) {
        errors.push(invalid(
            "tasks.base_url",
            format!("`{}` must start with http:// or https://", config.tasks.base_url),
        ));
    }
    let bad_validate_url = config
        .auth
        .validate_url
        .as_deref()
        .filter(|url| !has_scheme(url, &["http://", "https://"]));
    if let Some(url) = bad_validate_url {
        errors.push(invalid(
            "auth.validate_url",
            format!("`{url}` must start with http:// or https://"),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Extra checks that only apply when running the server.
pub fn validate_for_serve(config: &TaskchatConfig) -> Result<(), Vec<ConfigError>> {
    let secret_set = config
        .auth
        .jwt_secret
        .as_deref()
        .is_some_and(|s| !s.trim().is_empty());
    if !secret_set && config.auth.validate_url.is_none() {
        return Err(vec![ConfigError::MissingSetting {
            message: "no way to validate connection tokens".into(),
            help: "set auth.jwt_secret or auth.validate_url".into(),
        }]);
    }
    Ok(())
}

fn has_scheme(url: &str, schemes: &[&str]) -> bool {
    schemes.iter().any(|s| url.starts_with(s))
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::invalid_value(key, message)
}
