// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection state and client settings.

use std::time::Duration;

use strum::{Display, EnumString};

use taskchat_config::model::ClientConfig;

/// Lifecycle of the single outbound connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// WebSocket endpoint, e.g. `ws://127.0.0.1:3001/ws`.
    pub url: String,
    pub handshake_timeout: Duration,
    /// Automatic attempts after a transport drop before giving up.
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
}

impl From<&ClientConfig> for ClientSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            url: config.url.clone(),
            handshake_timeout: Duration::from_secs(config.handshake_timeout_secs),
            max_reconnect_attempts: config.max_reconnect_attempts,
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}
