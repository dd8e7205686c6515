// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Taskchat service and client.

use thiserror::Error;

/// The primary error type used across all Taskchat traits and core operations.
///
/// Every variant maps to a stable machine-readable [`code`](ChatError::code)
/// which is what clients see in `error` events and REST error bodies.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Missing, malformed, expired or rejected credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The caller is authenticated but not allowed to touch the resource.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Input rejected before any side effect (empty text, oversized text, bad ids).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced room, message or task does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The task service (or another upstream) could not be reached or answered badly.
    #[error("upstream unavailable: {message}")]
    UpstreamUnavailable {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The caller exhausted its request allowance.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// A uniqueness constraint rejected a write. The engine resolves these
    /// for room creation; anywhere else they surface as internal errors.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport-level failure on a realtime connection.
    #[error("connection error: {message}")]
    Connection {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChatError {
    /// Stable error code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::Auth(_) => "AUTH_ERROR",
            ChatError::AccessDenied(_) => "ACCESS_DENIED",
            ChatError::Validation(_) => "VALIDATION_ERROR",
            ChatError::NotFound(_) => "NOT_FOUND",
            ChatError::RateLimited(_) => "RATE_LIMITED",
            ChatError::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            ChatError::Timeout { .. } => "TIMEOUT",
            ChatError::Connection { .. } => "CONNECTION_ERROR",
            ChatError::Conflict(_)
            | ChatError::Storage { .. }
            | ChatError::Config(_)
            | ChatError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to hand to a remote caller.
    ///
    /// Storage and internal failures are collapsed to a generic string so
    /// database details never leave the process.
    pub fn public_message(&self) -> String {
        match self {
            ChatError::Auth(msg)
            | ChatError::AccessDenied(msg)
            | ChatError::Validation(msg)
            | ChatError::NotFound(msg)
            | ChatError::RateLimited(msg) => msg.clone(),
            ChatError::UpstreamUnavailable { message, .. } => message.clone(),
            ChatError::Timeout { .. } => self.to_string(),
            ChatError::Connection { message, .. } => message.clone(),
            ChatError::Conflict(_)
            | ChatError::Storage { .. }
            | ChatError::Config(_)
            | ChatError::Internal(_) => "internal server error".to_string(),
        }
    }

    /// Shorthand for an upstream failure without an underlying source.
    pub fn upstream(message: impl Into<String>) -> Self {
        ChatError::UpstreamUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a connection failure without an underlying source.
    pub fn connection(message: impl Into<String>) -> Self {
        ChatError::Connection {
            message: message.into(),
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ChatError::Auth("x".into()).code(), "AUTH_ERROR");
        assert_eq!(ChatError::AccessDenied("x".into()).code(), "ACCESS_DENIED");
        assert_eq!(ChatError::Validation("x".into()).code(), "VALIDATION_ERROR");
        assert_eq!(ChatError::NotFound("x".into()).code(), "NOT_FOUND");
        assert_eq!(ChatError::upstream("down").code(), "UPSTREAM_UNAVAILABLE");
        assert_eq!(ChatError::RateLimited("x".into()).code(), "RATE_LIMITED");
        assert_eq!(
            ChatError::Timeout {
                duration: std::time::Duration::from_secs(10)
            }
            .code(),
            "TIMEOUT"
        );
        assert_eq!(ChatError::Internal("x".into()).code(), "INTERNAL_ERROR");
    }

    #[test]
    fn storage_details_are_not_public() {
        let err = ChatError::Storage {
            source: Box::new(std::io::Error::other("disk I/O error at /var/lib/chat.db")),
        };
        assert_eq!(err.public_message(), "internal server error");
        assert!(err.to_string().contains("disk I/O error"));
    }

    #[test]
    fn validation_message_is_passed_through() {
        let err = ChatError::Validation("message cannot be empty".into());
        assert_eq!(err.public_message(), "message cannot be empty");
    }
}
