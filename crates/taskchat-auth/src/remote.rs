// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote token validation against the identity service.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use taskchat_core::{ChatError, Identity};

use crate::claims::identity_from_claims;

/// Calls `GET <url>` with the bearer token and maps the JSON answer
/// (`{userId, email, role|roles}`) to an identity.
#[derive(Debug, Clone)]
pub struct RemoteValidator {
    client: reqwest::Client,
    url: String,
}

impl RemoteValidator {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::Internal(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub async fn validate(&self, token: &str) -> Result<Identity, ChatError> {
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "identity service unreachable");
                ChatError::Auth("identity service unavailable".into())
            })?;

        let status = response.status();
        debug!(status = %status, "identity service responded");
        if !status.is_success() {
            return Err(ChatError::Auth("invalid or expired token".into()));
        }

        let body: Value = response.json().await.map_err(|e| {
            warn!(error = %e, "identity service returned an unreadable body");
            ChatError::Auth("invalid token response".into())
        })?;
        let claims = body
            .as_object()
            .ok_or_else(|| ChatError::Auth("invalid token response".into()))?;
        if claims.get("valid").and_then(Value::as_bool) == Some(false) {
            return Err(ChatError::Auth("invalid or expired token".into()));
        }
        identity_from_claims(claims, "userId")
    }
}
