// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity gateway for Taskchat.
//!
//! [`JwtIdentityGateway`] validates HS256 bearer tokens locally when a shared
//! secret is configured and falls back to the identity service's validate
//! endpoint otherwise. Every failure path ends in [`ChatError::Auth`]; the
//! gateway never lets an unverified token through.

pub mod claims;
pub mod remote;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::debug;

use taskchat_config::model::AuthConfig;
use taskchat_core::{AdapterType, ChatError, HealthStatus, Identity, IdentityGateway, PluginAdapter};

pub use remote::RemoteValidator;

struct LocalValidator {
    key: DecodingKey,
    validation: Validation,
}

impl LocalValidator {
    fn new(secret: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    fn decode(&self, token: &str) -> Result<serde_json::Map<String, Value>, jsonwebtoken::errors::Error> {
        let data = jsonwebtoken::decode::<serde_json::Map<String, Value>>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }
}

/// Token validator backed by a shared HS256 secret and/or a remote endpoint.
pub struct JwtIdentityGateway {
    local: Option<LocalValidator>,
    remote: Option<RemoteValidator>,
}

impl JwtIdentityGateway {
    pub fn from_config(config: &AuthConfig) -> Result<Self, ChatError> {
        let local = config
            .jwt_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|secret| LocalValidator::new(secret, config.jwt_issuer.as_deref()));
        let remote = config
            .validate_url
            .as_deref()
            .map(|url| RemoteValidator::new(url, std::time::Duration::from_secs(config.timeout_secs)))
            .transpose()?;
        if local.is_none() && remote.is_none() {
            return Err(ChatError::Config(
                "auth.jwt_secret or auth.validate_url must be set".into(),
            ));
        }
        Ok(Self { local, remote })
    }

    /// Local-only validation with the given secret.
    pub fn with_secret(secret: &str, issuer: Option<&str>) -> Self {
        Self {
            local: Some(LocalValidator::new(secret, issuer)),
            remote: None,
        }
    }
}

#[async_trait]
impl PluginAdapter for JwtIdentityGateway {
    fn name(&self) -> &str {
        "jwt"
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
impl IdentityGateway for JwtIdentityGateway {
    async fn validate_token(&self, token: &str) -> Result<Identity, ChatError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ChatError::Auth("authentication token required".into()));
        }

        if let Some(local) = &self.local {
            match local.decode(token) {
                Ok(claims) => return claims::identity_from_claims(&claims, "sub"),
                Err(e) => {
                    debug!(error = %e, "local token validation failed");
                    if self.remote.is_none() {
                        return Err(ChatError::Auth("invalid or expired token".into()));
                    }
                }
            }
        }

        match &self.remote {
            Some(remote) => remote.validate(token).await,
            None => Err(ChatError::Auth("invalid or expired token".into())),
        }
    }
}
