// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Taskchat configuration.
///
/// Every section is optional and defaults to values suitable for local
/// development.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TaskchatConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// HTTP/WebSocket listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Token validation settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Task service client settings.
    #[serde(default)]
    pub tasks: TasksConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Message and room limits.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Presence session housekeeping.
    #[serde(default)]
    pub presence: PresenceConfig,

    /// Settings for the `taskchat chat` terminal client.
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Name reported by the health endpoint.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "taskchat".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind. `0` picks an ephemeral port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origin. `None` allows any origin.
    #[serde(default)]
    pub cors_origin: Option<String>,

    /// REST requests each user may make per window. `0` disables the limit.
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: u32,

    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: None,
            rate_limit_requests: default_rate_limit_requests(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_rate_limit_requests() -> u32 {
    100
}

fn default_rate_limit_window_secs() -> u64 {
    15 * 60
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// HMAC secret for locally validating HS256 tokens.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Expected `iss` claim, checked when set.
    #[serde(default)]
    pub jwt_issuer: Option<String>,

    /// Remote validation endpoint of the identity service.
    #[serde(default)]
    pub validate_url: Option<String>,

    /// Timeout for remote validation calls.
    #[serde(default = "default_upstream_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_issuer: None,
            validate_url: None,
            timeout_secs: default_upstream_timeout_secs(),
        }
    }
}

// Secrets are redacted so configs can be logged.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| REDACTED))
            .field("jwt_issuer", &self.jwt_issuer)
            .field("validate_url", &self.validate_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

pub const REDACTED: &str = "[REDACTED]";

fn default_upstream_timeout_secs() -> u64 {
    5
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TasksConfig {
    /// Base URL of the task service, without the `/api/tasks` suffix.
    #[serde(default = "default_tasks_base_url")]
    pub base_url: String,

    /// Bearer token presented to the task service, if it requires one.
    #[serde(default)]
    pub service_token: Option<String>,

    #[serde(default = "default_upstream_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            base_url: default_tasks_base_url(),
            service_token: None,
            timeout_secs: default_upstream_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for TasksConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TasksConfig")
            .field("base_url", &self.base_url)
            .field("service_token", &self.service_token.as_ref().map(|_| REDACTED))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_tasks_base_url() -> String {
    "http://localhost:8082".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("taskchat").join("taskchat.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("taskchat.db"))
        .display()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    /// Maximum message length in characters, after trimming.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// Messages replayed to a connection when it joins a room.
    #[serde(default = "default_backlog_limit")]
    pub backlog_limit: u32,

    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,

    /// How long a typing indicator lives without a refresh.
    #[serde(default = "default_typing_timeout_ms")]
    pub typing_timeout_ms: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_chars: default_max_message_chars(),
            backlog_limit: default_backlog_limit(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            typing_timeout_ms: default_typing_timeout_ms(),
        }
    }
}

/// Hard ceiling on message length, also enforced by the database schema.
pub const MESSAGE_CHARS_CEILING: usize = 2000;

fn default_max_message_chars() -> usize {
    MESSAGE_CHARS_CEILING
}

fn default_backlog_limit() -> u32 {
    50
}

fn default_page_size() -> u32 {
    50
}

fn default_max_page_size() -> u32 {
    100
}

fn default_typing_timeout_ms() -> u64 {
    3000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PresenceConfig {
    /// How often the reaper runs.
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,

    /// Offline sessions older than this are deleted.
    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            reap_interval_secs: default_reap_interval_secs(),
            stale_after_hours: default_stale_after_hours(),
        }
    }
}

fn default_reap_interval_secs() -> u64 {
    3600
}

fn default_stale_after_hours() -> u64 {
    24
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// WebSocket endpoint of the chat service.
    #[serde(default = "default_client_url")]
    pub url: String,

    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: default_client_url(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

fn default_client_url() -> String {
    "ws://127.0.0.1:3001/ws".to_string()
}

fn default_handshake_timeout_secs() -> u64 {
    10
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}
