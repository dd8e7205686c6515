// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic cleanup of stale presence sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use taskchat_config::model::PresenceConfig;
use taskchat_core::types::timestamp_now;
use taskchat_core::{ChatError, ChatStore};

/// Deletes offline sessions last seen more than `stale_after_hours` ago.
pub async fn reap_once(store: &dyn ChatStore, stale_after_hours: u64) -> Result<u64, ChatError> {
    let cutoff = i64::try_from(stale_after_hours)
        .ok()
        .and_then(chrono::Duration::try_hours)
        .and_then(|age| timestamp_now().checked_sub_signed(age));
    let Some(cutoff) = cutoff else {
        return Ok(0);
    };
    let removed = store.reap_stale_sessions(cutoff).await?;
    if removed > 0 {
        info!(removed, "reaped stale presence sessions");
    } else {
        debug!("no stale presence sessions");
    }
    Ok(removed)
}

/// Runs [`reap_once`] every `reap_interval_secs` until `cancel` fires.
pub async fn run_reaper(store: Arc<dyn ChatStore>, config: PresenceConfig, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(Duration::from_secs(config.reap_interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("presence reaper stopped");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = reap_once(store.as_ref(), config.stale_after_hours).await {
                    warn!(error = %e, "presence reaper failed");
                }
            }
        }
    }
}
