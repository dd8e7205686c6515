// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity gateway trait: bearer token in, authenticated user out.

use async_trait::async_trait;

use crate::error::ChatError;
use crate::traits::adapter::PluginAdapter;
use crate::types::Identity;

#[async_trait]
pub trait IdentityGateway: PluginAdapter {
    /// Validates a bearer token.
    ///
    /// Returns [`ChatError::Auth`] for missing, malformed, expired or rejected
    /// tokens. Implementations must fail closed.
    async fn validate_token(&self, token: &str) -> Result<Identity, ChatError>;
}
