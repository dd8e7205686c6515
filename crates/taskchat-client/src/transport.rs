// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket handshake for the client.

use std::time::Duration;

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode, header::AUTHORIZATION};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use taskchat_core::{ChatError, ChatEvent, UserId};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An authenticated socket plus the server's greeting.
pub(crate) struct Opened {
    pub stream: WsStream,
    pub user_id: UserId,
    pub connection_id: String,
}

/// Opens the socket with the bearer token and waits for the server's
/// `connected` frame, all within `timeout`.
pub(crate) async fn open(url: &str, token: &str, timeout: Duration) -> Result<Opened, ChatError> {
    match tokio::time::timeout(timeout, handshake(url, token)).await {
        Ok(result) => result,
        Err(_) => Err(ChatError::Timeout { duration: timeout }),
    }
}

async fn handshake(url: &str, token: &str) -> Result<Opened, ChatError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| ChatError::Config(format!("invalid chat url {url}: {e}")))?;
    let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| ChatError::Auth("token contains invalid characters".into()))?;
    request.headers_mut().insert(AUTHORIZATION, bearer);

    let (mut stream, _) = connect_async(request).await.map_err(|e| match e {
        tungstenite::Error::Http(response) if response.status() == StatusCode::UNAUTHORIZED => {
            ChatError::Auth("handshake rejected: invalid or expired token".into())
        }
        other => ChatError::Connection {
            message: format!("failed to connect to {url}"),
            source: Some(Box::new(other)),
        },
    })?;

    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => match ChatEvent::from_frame(text.as_str()) {
                Ok(ChatEvent::Connected {
                    user_id,
                    connection_id,
                }) => {
                    debug!(user_id, connection_id = %connection_id, "handshake complete");
                    return Ok(Opened {
                        stream,
                        user_id,
                        connection_id,
                    });
                }
                Ok(ChatEvent::Error { message, .. }) => return Err(ChatError::Auth(message)),
                Ok(other) => debug!(event = %other.kind(), "ignoring frame before handshake"),
                Err(e) => debug!(error = %e, "ignoring unreadable frame before handshake"),
            },
            Some(Ok(Message::Close(_))) | None => {
                return Err(ChatError::connection("server closed the connection during handshake"));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                return Err(ChatError::Connection {
                    message: "handshake failed".into(),
                    source: Some(Box::new(e)),
                });
            }
        }
    }
}
