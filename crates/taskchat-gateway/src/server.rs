// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    http::HeaderValue,
    middleware as axum_middleware,
    routing::{get, patch, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use taskchat_config::model::ServerConfig;
use taskchat_core::{ChatError, IdentityGateway};
use taskchat_engine::ChatEngine;

use crate::auth::require_identity;
use crate::handlers;
use crate::limit::{RequestLimiter, limit_requests};
use crate::session::SessionManager;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub engine: Arc<ChatEngine>,
    pub sessions: Arc<SessionManager>,
    pub identity: Arc<dyn IdentityGateway>,
    /// Cancelled on shutdown; open sockets say goodbye and close.
    pub shutdown: CancellationToken,
    pub started_at: Instant,
}

impl GatewayState {
    pub fn new(
        engine: Arc<ChatEngine>,
        identity: Arc<dyn IdentityGateway>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(Arc::clone(&engine))),
            engine,
            identity,
            shutdown,
            started_at: Instant::now(),
        }
    }
}

fn cors_layer(origin: Option<&str>) -> Result<CorsLayer, ChatError> {
    match origin {
        None | Some("*") => Ok(CorsLayer::permissive()),
        Some(origin) => {
            let origin: HeaderValue = origin
                .parse()
                .map_err(|e| ChatError::Config(format!("invalid server.cors_origin: {e}")))?;
            Ok(CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(Any)
                .allow_headers(Any))
        }
    }
}

/// Builds the router:
/// - GET /health (public)
/// - /api/chat/... (bearer auth, then the per-user request limit)
/// - GET /ws (auth during the handshake)
pub fn router(state: GatewayState, config: &ServerConfig) -> Result<Router, ChatError> {
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route(
            "/api/chat/rooms/task/{task_id}",
            post(handlers::open_task_room).get(handlers::get_task_room),
        )
        .route("/api/chat/rooms", get(handlers::list_rooms))
        .route(
            "/api/chat/rooms/{room_id}/messages",
            get(handlers::list_messages),
        )
        .route(
            "/api/chat/rooms/{room_id}/messages/read",
            post(handlers::mark_read),
        )
        .route(
            "/api/chat/rooms/{room_id}/status",
            post(handlers::set_room_status),
        )
        .route("/api/chat/unread-count", get(handlers::unread_count))
        .route(
            "/api/chat/messages/{message_id}",
            patch(handlers::edit_message).delete(handlers::delete_message),
        );
    // Layers added later run first, so auth wraps the limiter.
    let api_routes = match RequestLimiter::from_config(config)? {
        Some(limiter) => api_routes.route_layer(axum_middleware::from_fn_with_state(
            Arc::new(limiter),
            limit_requests,
        )),
        None => api_routes,
    };
    let api_routes = api_routes
        .route_layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state.identity),
            require_identity,
        ))
        .with_state(state.clone());

    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    Ok(Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(cors_layer(config.cors_origin.as_deref())?)
        .layer(TraceLayer::new_for_http()))
}

/// Binds the configured address. Port 0 picks an ephemeral port.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, ChatError> {
    let addr = format!("{}:{}", config.host, config.port);
    TcpListener::bind(&addr)
        .await
        .map_err(|e| ChatError::Connection {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Serves the gateway on `listener` until `state.shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: GatewayState,
    config: ServerConfig,
) -> Result<(), ChatError> {
    let shutdown = state.shutdown.clone();
    let app = router(state, &config)?;

    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "gateway listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| ChatError::Connection {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Binds and serves in one call.
pub async fn start_server(config: &ServerConfig, state: GatewayState) -> Result<(), ChatError> {
    let listener = bind(config).await?;
    serve(listener, state, config.clone()).await
}
