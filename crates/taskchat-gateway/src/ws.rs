// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket endpoint for realtime chat.
//!
//! The bearer token travels in the `Authorization` header or the `token`
//! query parameter and is validated before the upgrade; an invalid token
//! gets a 401 and no socket.
//!
//! Client -> Server:
//! ```json
//! {"event": "join-task-room", "data": {"taskId": 42}}
//! {"event": "send-message", "data": {"taskId": 42, "message": "hi"}}
//! ```
//!
//! Server -> Client:
//! ```json
//! {"event": "connected", "data": {"userId": 7, "connectionId": "..."}}
//! {"event": "new-message", "data": {"id": "...", "senderRole": "bidder", ...}}
//! ```

use std::time::Duration;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use taskchat_core::{ChatError, ChatEvent, ClientCommand, Identity};

use crate::auth::bearer_token;
use crate::handlers::ApiError;
use crate::server::GatewayState;

/// Outbound frames buffered per connection before frames are dropped.
const OUTBOUND_BUFFER: usize = 64;

#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    #[serde(default)]
    pub token: Option<String>,
}

/// GET /ws
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
) -> Response {
    let token = bearer_token(&headers).or(params.token.filter(|t| !t.trim().is_empty()));
    let Some(token) = token else {
        return ApiError(ChatError::Auth("authentication token required".into())).into_response();
    };

    let identity = match state.identity.validate_token(&token).await {
        Ok(identity) => identity,
        Err(e) => {
            warn!(error = %e, "websocket handshake rejected");
            return ApiError(e).into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

async fn handle_socket(socket: WebSocket, state: GatewayState, identity: Identity) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
    let sessions = state.sessions.clone();
    let connection_id = sessions.register(identity, tx).await;

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                sessions.send(&connection_id, &ChatEvent::Disconnected {
                    reason: "server shutdown".into(),
                });
                break;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match ClientCommand::from_frame(text.as_str()) {
                    Ok(command) => sessions.handle_command(&connection_id, command).await,
                    Err(e) => {
                        warn!(connection_id = %connection_id, error = %e, "invalid websocket frame");
                        sessions.send_error(&connection_id, &e);
                    }
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(connection_id = %connection_id, error = %e, "websocket read failed");
                    break;
                }
            }
        }
    }

    // Dropping the last sender lets the writer flush and close the socket.
    sessions.on_disconnect(&connection_id).await;
    if tokio::time::timeout(Duration::from_secs(5), writer).await.is_err() {
        debug!(connection_id = %connection_id, "websocket writer did not finish in time");
    }
}
