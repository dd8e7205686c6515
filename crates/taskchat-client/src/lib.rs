// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client connection controller for Taskchat.
//!
//! A [`ChatClient`] owns at most one outbound WebSocket. UI code subscribes
//! to [`ChatEvent`]s with [`ChatClient::on`] instead of opening sockets of
//! its own, and drives the room protocol through the emission helpers.
//!
//! Transport drops are retried up to `max_reconnect_attempts` times. After
//! that a terminal `error` event is raised and recovery is left to an
//! explicit [`ChatClient::reconnect`].

pub mod listeners;
pub mod state;
mod transport;

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use futures::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use taskchat_config::model::ClientConfig;
use taskchat_core::{ChatError, ChatEvent, ClientCommand, EventKind, MessageType, TaskId, UserId};

pub use listeners::{Handler, ListenerId, Listeners};
pub use state::{ClientSettings, ConnectionState};

use transport::{Opened, WsStream};

const OUTBOUND_QUEUE: usize = 64;

/// Handle to the live socket. Cancelling it closes the socket and stops
/// the reader task without triggering a reconnect.
struct Link {
    cancel: CancellationToken,
}

struct Inner {
    settings: ClientSettings,
    state: watch::Sender<ConnectionState>,
    listeners: Listeners,
    /// Serializes connect, reconnect and teardown.
    link: Mutex<Option<Link>>,
    outbound: RwLock<Option<mpsc::Sender<String>>>,
    user_id: RwLock<Option<UserId>>,
    reconnect_attempts: AtomicU32,
    /// Bumped whenever the current link is replaced or torn down, so stale
    /// reader tasks know not to reconnect.
    generation: AtomicU64,
    closed: CancellationToken,
}

pub struct ChatClient {
    inner: Arc<Inner>,
}

impl ChatClient {
    pub fn new(settings: ClientSettings) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                settings,
                state,
                listeners: Listeners::default(),
                link: Mutex::new(None),
                outbound: RwLock::new(None),
                user_id: RwLock::new(None),
                reconnect_attempts: AtomicU32::new(0),
                generation: AtomicU64::new(0),
                closed: CancellationToken::new(),
            }),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(ClientSettings::from(config))
    }

    /// Connects with `token`, or returns immediately if already connected.
    ///
    /// Concurrent callers share one attempt: the second waits for the first
    /// and then sees `Connected`. A failed or timed-out handshake leaves the
    /// client `Disconnected`.
    pub async fn connect(&self, token: &str) -> Result<(), ChatError> {
        let mut link = self.inner.link.lock().await;
        if self.state() == ConnectionState::Connected {
            return Ok(());
        }
        self.inner.teardown(&mut link);
        self.inner.open_and_install(&mut link, token).await
    }

    /// Drops any existing connection and connects again. Listeners are kept.
    pub async fn reconnect(&self, token: &str) -> Result<(), ChatError> {
        let mut link = self.inner.link.lock().await;
        self.inner.teardown(&mut link);
        self.inner.reconnect_attempts.store(0, Ordering::SeqCst);
        self.inner.open_and_install(&mut link, token).await
    }

    /// Closes the connection and forgets every registered listener.
    pub async fn disconnect(&self) {
        let mut link = self.inner.link.lock().await;
        self.inner.teardown(&mut link);
        self.inner.listeners.clear();
        self.inner.state.send_replace(ConnectionState::Disconnected);
        info!("disconnected");
    }

    pub fn on(
        &self,
        kind: EventKind,
        handler: impl Fn(&ChatEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner.listeners.on(kind, Arc::new(handler))
    }

    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.inner.listeners.off(kind, id)
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner.listeners.count(kind)
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Watch channel that follows every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.reconnect_attempts.load(Ordering::SeqCst)
    }

    /// The authenticated user of the current connection.
    pub fn user_id(&self) -> Option<UserId> {
        *self
            .inner
            .user_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.inner.settings
    }

    pub fn join_task_room(&self, task_id: TaskId) -> Result<(), ChatError> {
        self.inner.emit(&ClientCommand::JoinTaskRoom { task_id })
    }

    pub fn send_message(
        &self,
        task_id: TaskId,
        message: &str,
        message_type: MessageType,
    ) -> Result<(), ChatError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::Validation("message cannot be empty".into()));
        }
        self.inner.emit(&ClientCommand::SendMessage {
            task_id,
            message: message.to_owned(),
            message_type,
        })
    }

    pub fn send_typing(&self, task_id: TaskId) -> Result<(), ChatError> {
        self.inner.emit(&ClientCommand::Typing { task_id })
    }

    pub fn send_stop_typing(&self, task_id: TaskId) -> Result<(), ChatError> {
        self.inner.emit(&ClientCommand::StopTyping { task_id })
    }

    pub fn mark_messages_read(
        &self,
        room_id: &str,
        message_ids: Vec<String>,
    ) -> Result<(), ChatError> {
        self.inner.emit(&ClientCommand::MarkMessagesRead {
            room_id: room_id.to_owned(),
            message_ids,
        })
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        self.inner.closed.cancel();
    }
}

impl Inner {
    fn emit(&self, command: &ClientCommand) -> Result<(), ChatError> {
        let frame = command.to_frame()?;
        let outbound = self.outbound.read().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = outbound.as_ref() else {
            return Err(ChatError::connection("not connected"));
        };
        tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ChatError::connection("outbound queue is full"),
            mpsc::error::TrySendError::Closed(_) => ChatError::connection("not connected"),
        })
    }

    fn superseded(&self, generation: u64) -> bool {
        self.closed.is_cancelled() || self.generation.load(Ordering::SeqCst) != generation
    }

    fn teardown(&self, link: &mut Option<Link>) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(old) = link.take() {
            old.cancel.cancel();
        }
        self.clear_outbound();
    }

    fn clear_outbound(&self) {
        *self.outbound.write().unwrap_or_else(PoisonError::into_inner) = None;
        *self.user_id.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    async fn open_and_install(
        self: &Arc<Self>,
        link: &mut Option<Link>,
        token: &str,
    ) -> Result<(), ChatError> {
        self.state.send_replace(ConnectionState::Connecting);
        info!(url = %self.settings.url, "connecting");
        match transport::open(&self.settings.url, token, self.settings.handshake_timeout).await {
            Ok(opened) => {
                self.install(link, opened, token);
                Ok(())
            }
            Err(e) => {
                self.state.send_replace(ConnectionState::Disconnected);
                warn!(error = %e, "connect failed");
                Err(e)
            }
        }
    }

    fn install(self: &Arc<Self>, link: &mut Option<Link>, opened: Opened, token: &str) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = self.closed.child_token();
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);

        *self.outbound.write().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        *self.user_id.write().unwrap_or_else(PoisonError::into_inner) = Some(opened.user_id);
        *link = Some(Link {
            cancel: cancel.clone(),
        });

        tokio::spawn(run_link(
            Arc::downgrade(self),
            opened.stream,
            rx,
            cancel,
            token.to_owned(),
            generation,
        ));

        self.reconnect_attempts.store(0, Ordering::SeqCst);
        self.state.send_replace(ConnectionState::Connected);
        info!(user_id = opened.user_id, connection_id = %opened.connection_id, "connected");
        self.listeners.emit(&ChatEvent::Connected {
            user_id: opened.user_id,
            connection_id: opened.connection_id,
        });
    }

    async fn on_transport_lost(
        self: Arc<Self>,
        generation: u64,
        reason: String,
        announced: bool,
        token: String,
    ) {
        {
            let mut link = self.link.lock().await;
            if self.superseded(generation) {
                return;
            }
            link.take();
            self.clear_outbound();
            self.state.send_replace(ConnectionState::Disconnected);
            warn!(reason = %reason, "connection lost");
            if !announced {
                self.listeners.emit(&ChatEvent::Disconnected { reason });
            }
        }

        let max = self.settings.max_reconnect_attempts;
        for attempt in 1..=max {
            self.reconnect_attempts.store(attempt, Ordering::SeqCst);
            tokio::select! {
                _ = self.closed.cancelled() => return,
                _ = tokio::time::sleep(self.settings.reconnect_delay) => {}
            }

            let mut link = self.link.lock().await;
            if self.superseded(generation) {
                return;
            }
            debug!(attempt, max, "reconnecting");
            if self.open_and_install(&mut link, &token).await.is_ok() {
                return;
            }
        }

        let _link = self.link.lock().await;
        if self.superseded(generation) {
            return;
        }
        warn!(attempts = max, "giving up on reconnect");
        self.listeners.emit(&ChatEvent::Error {
            message: format!("connection lost; gave up after {max} reconnect attempts"),
            code: Some("CONNECTION_ERROR".to_owned()),
        });
    }
}

/// Pumps outbound frames to the socket and inbound events to listeners
/// until the link is cancelled or the transport drops.
async fn run_link(
    inner: Weak<Inner>,
    stream: WsStream,
    mut outbound: mpsc::Receiver<String>,
    cancel: CancellationToken,
    token: String,
    generation: u64,
) {
    let (mut sink, mut source) = stream.split();
    // Set once the server has said goodbye itself, so the local event is
    // not raised twice.
    let mut announced = false;

    let reason = loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                debug!("link closed locally");
                return;
            }
            Some(frame) = outbound.recv() => {
                if let Err(e) = sink.send(Message::Text(frame.into())).await {
                    break format!("send failed: {e}");
                }
            }
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let event = match ChatEvent::from_frame(text.as_str()) {
                        Ok(event) => event,
                        Err(e) => {
                            warn!(error = %e, "dropping unreadable frame");
                            continue;
                        }
                    };
                    if matches!(event, ChatEvent::Disconnected { .. }) {
                        announced = true;
                    }
                    let Some(inner) = inner.upgrade() else {
                        return;
                    };
                    inner.listeners.emit(&event);
                }
                Some(Ok(Message::Close(frame))) => {
                    break match frame {
                        Some(frame) if !frame.reason.is_empty() => frame.reason.as_str().to_owned(),
                        _ => "server closed the connection".to_owned(),
                    };
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break format!("transport error: {e}"),
                None => break "connection lost".to_owned(),
            }
        }
    };

    drop(outbound);
    let Some(inner) = inner.upgrade() else {
        return;
    };
    inner
        .on_transport_lost(generation, reason, announced, token)
        .await;
}
