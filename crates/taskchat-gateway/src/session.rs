// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection session manager.
//!
//! Tracks every authenticated realtime connection, routes client commands
//! to the engine and fans results out through the [`RoomHub`]. A connection
//! only reaches this type after its token was validated, so nothing here
//! deals with authentication.
//!
//! Room-scoped failures are answered with an in-band `error` event to the
//! originating connection; they never close the socket.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use taskchat_core::types::{new_id, timestamp_now};
use taskchat_core::{
    ChatError, ChatEvent, ClientCommand, Identity, MessageType, Session, TaskId, UserId,
};
use taskchat_engine::ChatEngine;

use crate::hub::RoomHub;

#[derive(Clone)]
struct ConnectionHandle {
    identity: Identity,
    tx: mpsc::Sender<String>,
}

pub struct SessionManager {
    engine: Arc<ChatEngine>,
    hub: Arc<RoomHub>,
    connections: DashMap<String, ConnectionHandle>,
    user_connections: DashMap<UserId, HashSet<String>>,
    // connection -> tasks whose room it joined
    joined: DashMap<String, HashSet<TaskId>>,
    // user -> ids of rooms joined by any of their connections
    user_rooms: DashMap<UserId, HashSet<String>>,
    typing_timeout: Duration,
}

impl SessionManager {
    pub fn new(engine: Arc<ChatEngine>) -> Self {
        let typing_timeout = Duration::from_millis(engine.limits().typing_timeout_ms);
        Self {
            engine,
            hub: Arc::new(RoomHub::new()),
            connections: DashMap::new(),
            user_connections: DashMap::new(),
            joined: DashMap::new(),
            user_rooms: DashMap::new(),
            typing_timeout,
        }
    }

    /// Registers an authenticated connection, records its presence session
    /// and greets it with `connected`. Returns the new connection id.
    pub async fn register(&self, identity: Identity, tx: mpsc::Sender<String>) -> String {
        let connection_id = new_id();
        let user_id = identity.user_id;
        let now = timestamp_now();
        let session = Session {
            connection_id: connection_id.clone(),
            user_id,
            email: identity.email.clone(),
            is_online: true,
            last_seen: now,
            current_room: None,
            created_at: now,
        };

        self.connections
            .insert(connection_id.clone(), ConnectionHandle { identity, tx });
        self.user_connections
            .entry(user_id)
            .or_default()
            .insert(connection_id.clone());

        if let Err(e) = self.engine.store().create_session(&session).await {
            warn!(connection_id = %connection_id, user_id, error = %e, "presence session not recorded");
        }

        self.send(
            &connection_id,
            &ChatEvent::Connected {
                user_id,
                connection_id: connection_id.clone(),
            },
        );
        info!(connection_id = %connection_id, user_id, "connection established");
        connection_id
    }

    /// Runs one client command, answering failures with an `error` event.
    pub async fn handle_command(&self, connection_id: &str, command: ClientCommand) {
        let result = match command {
            ClientCommand::JoinTaskRoom { task_id } => self.on_join_room(connection_id, task_id).await,
            ClientCommand::SendMessage {
                task_id,
                message,
                message_type,
            } => {
                self.on_send_message(connection_id, task_id, &message, message_type)
                    .await
            }
            ClientCommand::Typing { task_id } => self.on_typing(connection_id, task_id).await,
            ClientCommand::StopTyping { task_id } => {
                self.on_stop_typing(connection_id, task_id).await
            }
            ClientCommand::MarkMessagesRead {
                room_id,
                message_ids,
            } => self.on_mark_read(connection_id, &room_id, &message_ids).await,
        };

        if let Err(e) = result {
            debug!(connection_id, error = %e, "command failed");
            self.send_error(connection_id, &e);
        }
    }

    pub async fn on_join_room(&self, connection_id: &str, task_id: TaskId) -> Result<(), ChatError> {
        let handle = self.handle(connection_id)?;
        let user_id = handle.identity.user_id;
        let room = self.engine.get_or_create_room(task_id, user_id).await?;

        // Join before reading the backlog so nothing sent in between is lost.
        self.hub
            .join(task_id, connection_id, user_id, handle.tx.clone())
            .await;
        self.joined
            .entry(connection_id.to_string())
            .or_default()
            .insert(task_id);
        self.user_rooms
            .entry(user_id)
            .or_default()
            .insert(room.id.clone());

        let messages = self.engine.backlog(&room).await?;
        if let Err(e) = self
            .engine
            .store()
            .set_session_room(connection_id, Some(&room.id))
            .await
        {
            warn!(connection_id, error = %e, "presence room not recorded");
        }

        self.send(
            connection_id,
            &ChatEvent::RoomJoined {
                room: self.engine.room_details(&room, user_id),
                messages,
            },
        );
        info!(connection_id, user_id, task_id, room_id = %room.id, "joined task room");
        Ok(())
    }

    pub async fn on_send_message(
        &self,
        connection_id: &str,
        task_id: TaskId,
        text: &str,
        message_type: MessageType,
    ) -> Result<(), ChatError> {
        let handle = self.handle(connection_id)?;
        let room = self
            .engine
            .get_room_by_task(task_id, handle.identity.user_id)
            .await?;
        let message = self
            .engine
            .send_in_room(&room, &handle.identity, text, message_type)
            .await?;

        let reached = self
            .hub
            .broadcast(task_id, &ChatEvent::NewMessage(message), None)
            .await;
        debug!(connection_id, task_id, reached, "message fanned out");
        Ok(())
    }

    pub async fn on_typing(&self, connection_id: &str, task_id: TaskId) -> Result<(), ChatError> {
        let user_id = self.joined_user(connection_id, task_id)?;
        let Some(generation) = self.hub.set_typing(task_id, user_id).await else {
            return Ok(());
        };

        let hub = Arc::clone(&self.hub);
        let timeout = self.typing_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            hub.expire_typing(task_id, user_id, generation).await;
        });
        Ok(())
    }

    pub async fn on_stop_typing(&self, connection_id: &str, task_id: TaskId) -> Result<(), ChatError> {
        let user_id = self.joined_user(connection_id, task_id)?;
        self.hub.stop_typing(task_id, user_id).await;
        Ok(())
    }

    /// Marks messages read and answers the caller with its recomputed
    /// unread count. Nothing is broadcast.
    pub async fn on_mark_read(
        &self,
        connection_id: &str,
        room_id: &str,
        message_ids: &[String],
    ) -> Result<(), ChatError> {
        let handle = self.handle(connection_id)?;
        let unread_count = self
            .engine
            .mark_read(room_id, message_ids, handle.identity.user_id)
            .await?;
        self.send(
            connection_id,
            &ChatEvent::MessagesRead {
                room_id: room_id.to_string(),
                unread_count,
            },
        );
        Ok(())
    }

    /// Drops the connection from every room group and marks its presence
    /// session offline. Rooms and messages are untouched.
    pub async fn on_disconnect(&self, connection_id: &str) {
        let Some((_, handle)) = self.connections.remove(connection_id) else {
            return;
        };
        let user_id = handle.identity.user_id;

        if let Some((_, tasks)) = self.joined.remove(connection_id) {
            for task_id in tasks {
                self.hub.leave(task_id, connection_id).await;
            }
        }

        let last_connection = match self.user_connections.get_mut(&user_id) {
            Some(mut ids) => {
                ids.remove(connection_id);
                ids.is_empty()
            }
            None => true,
        };
        if last_connection {
            self.user_connections.remove_if(&user_id, |_, ids| ids.is_empty());
            self.user_rooms.remove(&user_id);
        }

        if let Err(e) = self
            .engine
            .store()
            .mark_session_offline(connection_id, timestamp_now())
            .await
        {
            warn!(connection_id, error = %e, "presence session not closed");
        }
        info!(connection_id, user_id, "connection closed");
    }

    /// Sends an event to one connection. Full or closed queues drop the
    /// frame.
    pub fn send(&self, connection_id: &str, event: &ChatEvent) {
        let Some(tx) = self.connections.get(connection_id).map(|h| h.tx.clone()) else {
            return;
        };
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(connection_id, error = %e, "failed to encode event");
                return;
            }
        };
        if let Err(e) = tx.try_send(frame) {
            warn!(connection_id, error = %e, "dropping frame for slow connection");
        }
    }

    pub fn send_error(&self, connection_id: &str, error: &ChatError) {
        self.send(connection_id, &ChatEvent::from_error(error));
    }

    pub fn is_user_online(&self, user_id: UserId) -> bool {
        self.user_connections
            .get(&user_id)
            .is_some_and(|ids| !ids.is_empty())
    }

    pub fn connected_user_count(&self) -> usize {
        self.user_connections
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .count()
    }

    pub fn connection_count(&self, user_id: UserId) -> usize {
        self.user_connections
            .get(&user_id)
            .map_or(0, |ids| ids.len())
    }

    pub async fn room_connection_count(&self, task_id: TaskId) -> usize {
        self.hub.member_count(task_id).await
    }

    /// Rooms with at least one joined connection.
    pub fn active_room_count(&self) -> usize {
        self.hub.room_count()
    }

    /// Ids of the rooms the user's connections have joined.
    pub fn user_rooms(&self, user_id: UserId) -> Vec<String> {
        let mut rooms: Vec<String> = self
            .user_rooms
            .get(&user_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    pub async fn typing_users(&self, task_id: TaskId) -> Vec<UserId> {
        self.hub.typing_users(task_id).await
    }

    fn handle(&self, connection_id: &str) -> Result<ConnectionHandle, ChatError> {
        self.connections
            .get(connection_id)
            .map(|h| h.value().clone())
            .ok_or_else(|| ChatError::connection("connection is not registered"))
    }

    fn joined_user(&self, connection_id: &str, task_id: TaskId) -> Result<UserId, ChatError> {
        let handle = self.handle(connection_id)?;
        let joined = self
            .joined
            .get(connection_id)
            .is_some_and(|tasks| tasks.contains(&task_id));
        if joined {
            Ok(handle.identity.user_id)
        } else {
            Err(ChatError::AccessDenied("join the task room first".into()))
        }
    }
}
