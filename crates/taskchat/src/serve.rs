// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `taskchat serve` command implementation.
//!
//! Opens the SQLite store, wires the identity gateway and task service
//! client into the engine, then serves the gateway until a shutdown signal.
//! The presence reaper runs alongside and stops with the server.

use std::sync::Arc;

use tracing::{info, warn};

use taskchat_auth::JwtIdentityGateway;
use taskchat_config::TaskchatConfig;
use taskchat_core::{
    ChatError, ChatStore, HealthStatus, IdentityGateway, PluginAdapter, TaskOwnershipProvider,
};
use taskchat_engine::ChatEngine;
use taskchat_gateway::{GatewayState, presence, start_server};
use taskchat_storage::SqliteStore;
use taskchat_tasks::HttpTaskProvider;

use crate::shutdown;

/// Runs the `taskchat serve` command.
pub async fn run_serve(config: TaskchatConfig) -> Result<(), ChatError> {
    init_tracing(&config.service.log_level);

    info!(name = %config.service.name, "starting taskchat serve");

    let store = SqliteStore::new(config.storage.clone());
    store.initialize().await?;
    let store: Arc<dyn ChatStore> = Arc::new(store);

    let identity: Arc<dyn IdentityGateway> = Arc::new(JwtIdentityGateway::from_config(&config.auth)?);
    let tasks: Arc<dyn TaskOwnershipProvider> = Arc::new(HttpTaskProvider::new(&config.tasks)?);

    report_health(store.as_ref()).await;
    report_health(identity.as_ref()).await;
    report_health(tasks.as_ref()).await;

    let engine = Arc::new(ChatEngine::new(
        Arc::clone(&store),
        Arc::clone(&tasks),
        config.chat.clone(),
    ));

    let cancel = shutdown::install_signal_handler();
    let state = GatewayState::new(engine, Arc::clone(&identity), cancel.clone());

    let reaper = tokio::spawn(presence::run_reaper(
        Arc::clone(&store),
        config.presence.clone(),
        cancel.clone(),
    ));

    let result = start_server(&config.server, state).await;

    // A bind failure returns before any signal; stop the reaper too.
    cancel.cancel();
    if let Err(e) = reaper.await {
        warn!(error = %e, "presence reaper task failed");
    }

    if let Err(e) = identity.shutdown().await {
        warn!(adapter = identity.name(), error = %e, "adapter shutdown failed");
    }
    if let Err(e) = tasks.shutdown().await {
        warn!(adapter = tasks.name(), error = %e, "adapter shutdown failed");
    }
    store.close().await?;

    info!("taskchat stopped");
    result
}

async fn report_health<A: PluginAdapter + ?Sized>(adapter: &A) {
    match adapter.health_check().await {
        Ok(HealthStatus::Healthy) => {
            info!(adapter = adapter.name(), kind = %adapter.adapter_type(), "adapter ready");
        }
        Ok(HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason)) => {
            warn!(adapter = adapter.name(), kind = %adapter.adapter_type(), reason = %reason, "adapter not healthy");
        }
        Err(e) => {
            warn!(adapter = adapter.name(), error = %e, "adapter health check failed");
        }
    }
}

/// Initialize the tracing subscriber with an env filter.
///
/// `RUST_LOG` wins over the configured level when set.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("taskchat={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
