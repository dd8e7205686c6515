// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence trait for rooms, messages and presence sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ChatError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Message, Role, Room, RoomStatus, Session, TaskId, UserId};

/// Durable store behind the chat engine.
///
/// Each method is an atomic unit on its own. Multi-step flows (persist a
/// message, then bump the recipient's counter) are sequenced by the engine.
#[async_trait]
pub trait ChatStore: PluginAdapter {
    /// Initializes the backend (migrations, pragmas).
    async fn initialize(&self) -> Result<(), ChatError>;

    /// Closes the backend, flushing pending writes.
    async fn close(&self) -> Result<(), ChatError>;

    // --- rooms ---

    /// Inserts a room. Returns [`ChatError::Conflict`] when an ACTIVE room
    /// already exists for the same task.
    async fn insert_room(&self, room: &Room) -> Result<(), ChatError>;

    async fn get_room(&self, room_id: &str) -> Result<Option<Room>, ChatError>;

    /// The single ACTIVE room of a task, if any.
    async fn find_active_room_by_task(&self, task_id: TaskId) -> Result<Option<Room>, ChatError>;

    /// The most recently created room of a task regardless of status.
    async fn find_latest_room_by_task(&self, task_id: TaskId) -> Result<Option<Room>, ChatError>;

    /// ACTIVE rooms the user belongs to, most recent activity first.
    async fn list_rooms_for_user(
        &self,
        user_id: UserId,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<Vec<Room>, ChatError>;

    /// Atomically increments the recipient's unread counter and stamps the
    /// room's last-message metadata.
    async fn record_message_sent(
        &self,
        room_id: &str,
        sender_id: UserId,
        recipient: Role,
        at: DateTime<Utc>,
    ) -> Result<(), ChatError>;

    /// Overwrites one role's unread counter.
    async fn set_unread_count(&self, room_id: &str, role: Role, count: u64) -> Result<(), ChatError>;

    async fn set_room_status(&self, room_id: &str, status: RoomStatus) -> Result<(), ChatError>;

    // --- messages ---

    async fn insert_message(&self, message: &Message) -> Result<(), ChatError>;

    async fn get_message(&self, message_id: &str) -> Result<Option<Message>, ChatError>;

    /// Non-deleted messages of a room, newest first.
    async fn list_messages(
        &self,
        room_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>, ChatError>;

    async fn latest_message(&self, room_id: &str) -> Result<Option<Message>, ChatError>;

    /// Flags the listed messages of `room_id` as read, skipping messages
    /// authored by the reader. Returns the number of rows changed.
    async fn mark_messages_read(
        &self,
        room_id: &str,
        message_ids: &[String],
        reader_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<u64, ChatError>;

    /// Unread, non-deleted messages in `room_id` not authored by `reader_id`.
    async fn count_unread(&self, room_id: &str, reader_id: UserId) -> Result<u64, ChatError>;

    async fn update_message_text(
        &self,
        message_id: &str,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ChatError>;

    async fn soft_delete_message(&self, message_id: &str, at: DateTime<Utc>) -> Result<(), ChatError>;

    // --- presence ---

    async fn create_session(&self, session: &Session) -> Result<(), ChatError>;

    async fn set_session_room(
        &self,
        connection_id: &str,
        room_id: Option<&str>,
    ) -> Result<(), ChatError>;

    async fn mark_session_offline(
        &self,
        connection_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ChatError>;

    async fn list_online_sessions(&self, user_id: UserId) -> Result<Vec<Session>, ChatError>;

    /// Deletes offline sessions last seen before `cutoff`. Returns the count.
    async fn reap_stale_sessions(&self, cutoff: DateTime<Utc>) -> Result<u64, ChatError>;
}
