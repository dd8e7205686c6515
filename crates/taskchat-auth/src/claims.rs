// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping from token claims (or a validation response) to an [`Identity`].

use serde_json::{Map, Value};
use taskchat_core::{ChatError, Identity, UserId};

const DEFAULT_EMAIL: &str = "unknown@example.com";
const DEFAULT_ROLE: &str = "USER";

/// Builds an identity from a claims object.
///
/// `id_claim` names the claim holding the numeric user id (`sub` for JWTs,
/// `userId` for the identity service's validate response).
pub fn identity_from_claims(claims: &Map<String, Value>, id_claim: &str) -> Result<Identity, ChatError> {
    let user_id = claims
        .get(id_claim)
        .and_then(parse_user_id)
        .ok_or_else(|| ChatError::Auth(format!("token `{id_claim}` is not a user id")))?;

    let email = claims
        .get("email")
        .and_then(Value::as_str)
        .filter(|e| !e.is_empty())
        .unwrap_or(DEFAULT_EMAIL)
        .to_string();

    let role = claims
        .get("roles")
        .or_else(|| claims.get("role"))
        .and_then(role_string)
        .unwrap_or_else(|| DEFAULT_ROLE.to_string());

    Ok(Identity {
        user_id,
        email,
        role,
    })
}

/// Accepts both `42` and `"42"`.
pub fn parse_user_id(value: &Value) -> Option<UserId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn role_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let roles: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            (!roles.is_empty()).then(|| roles.join(","))
        }
        _ => None,
    }
}
