// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user request limit for the REST routes.
//!
//! Runs after [`require_identity`](crate::auth::require_identity), so the
//! caller is always known and the limit is keyed by user id. The quota is a
//! burst of `rate_limit_requests` refilled evenly over the window.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use taskchat_config::model::ServerConfig;
use taskchat_core::{ChatError, Identity, UserId};

use crate::handlers::ApiError;

pub struct RequestLimiter {
    limiter: DefaultKeyedRateLimiter<UserId>,
}

impl RequestLimiter {
    /// Builds the limiter from `[server]`. `None` when the limit is off.
    pub fn from_config(config: &ServerConfig) -> Result<Option<Self>, ChatError> {
        let Some(burst) = NonZeroU32::new(config.rate_limit_requests) else {
            return Ok(None);
        };
        let window = Duration::from_secs(config.rate_limit_window_secs);
        let quota = Quota::with_period(window / burst.get()).ok_or_else(|| {
            ChatError::Config("server.rate_limit_window_secs is too short for the request limit".into())
        })?;
        Ok(Some(Self {
            limiter: RateLimiter::keyed(quota.allow_burst(burst)),
        }))
    }

    pub fn check(&self, user_id: UserId) -> Result<(), ChatError> {
        self.limiter.check_key(&user_id).map_err(|_| {
            ChatError::RateLimited("too many requests, please try again later".into())
        })
    }
}

/// Middleware that answers 429 once the caller spent their quota.
pub async fn limit_requests(
    State(limiter): State<Arc<RequestLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(user_id) = request.extensions().get::<Identity>().map(|i| i.user_id) else {
        return ApiError(ChatError::Auth("authentication token required".into())).into_response();
    };

    match limiter.check(user_id) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::debug!(user_id, "request rate limited");
            ApiError(e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(requests: u32, window_secs: u64) -> ServerConfig {
        ServerConfig {
            rate_limit_requests: requests,
            rate_limit_window_secs: window_secs,
            ..ServerConfig::default()
        }
    }

    #[test]
    fn quota_is_tracked_per_user() {
        let limiter = RequestLimiter::from_config(&config(2, 60)).unwrap().unwrap();
        assert!(limiter.check(1).is_ok());
        assert!(limiter.check(1).is_ok());

        let err = limiter.check(1).unwrap_err();
        assert_eq!(err.code(), "RATE_LIMITED");
        assert!(limiter.check(2).is_ok());
    }

    #[test]
    fn zero_requests_disables_the_limit() {
        assert!(RequestLimiter::from_config(&config(0, 60)).unwrap().is_none());
    }

    #[test]
    fn zero_window_is_a_config_error() {
        let err = RequestLimiter::from_config(&config(5, 0)).err().unwrap();
        assert!(matches!(err, ChatError::Config(_)));
    }
}
