// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity gateway backed by a fixed token table.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use taskchat_core::traits::adapter::PluginAdapter;
use taskchat_core::types::{AdapterType, HealthStatus};
use taskchat_core::{ChatError, Identity, IdentityGateway, UserId};

/// Conventional bearer token for a test user.
pub fn token_for(user_id: UserId) -> String {
    format!("token-{user_id}")
}

/// A student identity with a predictable email.
pub fn identity(user_id: UserId) -> Identity {
    Identity {
        user_id,
        email: format!("user{user_id}@example.com"),
        role: "student".to_string(),
    }
}

/// Accepts only the tokens it was given; everything else is an auth error.
#[derive(Default)]
pub struct StaticIdentityGateway {
    tokens: RwLock<HashMap<String, Identity>>,
}

impl StaticIdentityGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `identity(user_id)` under `token_for(user_id)`.
    pub fn with_user(self, user_id: UserId) -> Self {
        self.insert(&token_for(user_id), identity(user_id));
        self
    }

    pub fn insert(&self, token: &str, identity: Identity) {
        self.tokens
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(token.to_string(), identity);
    }

    /// Makes `token` invalid from now on.
    pub fn revoke(&self, token: &str) {
        self.tokens
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(token);
    }
}

#[async_trait]
impl PluginAdapter for StaticIdentityGateway {
    fn name(&self) -> &str {
        "static-identity"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Identity
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ChatError> {
        Ok(())
    }
}

#[async_trait]
impl IdentityGateway for StaticIdentityGateway {
    async fn validate_token(&self, token: &str) -> Result<Identity, ChatError> {
        self.tokens
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(token)
            .cloned()
            .ok_or_else(|| ChatError::Auth("invalid or expired token".into()))
    }
}
