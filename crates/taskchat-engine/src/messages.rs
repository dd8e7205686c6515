// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sending, paging, read receipts, edits and deletes.
//!
//! The store offers no multi-row transaction across rooms and messages, so
//! writes are ordered: the message row first, then the room's counters. A
//! message with stale room metadata can be re-derived; the reverse cannot.

use tracing::{debug, warn};

use taskchat_core::types::{new_id, timestamp_now};
use taskchat_core::{ChatError, Identity, Message, MessageType, Room, RoomStatus, UserId};

use crate::role::{party_id, resolve_role, sender_name, surface};
use crate::{ChatEngine, validate_text};

fn ensure_active(room: &Room) -> Result<(), ChatError> {
    match room.status {
        RoomStatus::Active => Ok(()),
        RoomStatus::Archived => Err(ChatError::AccessDenied(
            "this chat room has been archived".into(),
        )),
        RoomStatus::Blocked => Err(ChatError::AccessDenied(
            "this chat room has been blocked".into(),
        )),
    }
}

impl ChatEngine {
    /// The newest `backlog_limit` messages of a room in chronological order.
    pub async fn backlog(&self, room: &Room) -> Result<Vec<Message>, ChatError> {
        let mut messages = self
            .store
            .list_messages(&room.id, self.limits.backlog_limit, 0)
            .await?;
        messages.reverse();
        Ok(messages.into_iter().map(|m| surface(room, m)).collect())
    }

    /// A newest-first page of non-deleted messages. Callers reverse it for
    /// display.
    pub async fn list_messages(
        &self,
        room_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>, ChatError> {
        let room = self
            .store
            .get_room(room_id)
            .await?
            .ok_or_else(|| ChatError::NotFound("chat room not found".into()))?;
        let limit = limit.clamp(1, self.limits.max_page_size.max(1));
        let messages = self.store.list_messages(&room.id, limit, offset).await?;
        Ok(messages.into_iter().map(|m| surface(&room, m)).collect())
    }

    /// Validates, persists and accounts a message sent by `sender` into the
    /// room with id `room_id`.
    pub async fn send_message(
        &self,
        room_id: &str,
        sender: &Identity,
        text: &str,
        message_type: MessageType,
    ) -> Result<Message, ChatError> {
        let room = self.room_for_member(room_id, sender.user_id).await?;
        self.send_in_room(&room, sender, text, message_type).await
    }

    /// Same as [`ChatEngine::send_message`] for a room the caller already
    /// holds.
    pub async fn send_in_room(
        &self,
        room: &Room,
        sender: &Identity,
        text: &str,
        message_type: MessageType,
    ) -> Result<Message, ChatError> {
        let text = validate_text(text, self.limits.max_message_chars)?;
        if !room.is_member(sender.user_id) {
            return Err(ChatError::AccessDenied(
                "you are not a participant of this chat".into(),
            ));
        }
        ensure_active(room)?;

        let role = resolve_role(room, sender.user_id);
        let now = timestamp_now();
        let message = Message {
            id: new_id(),
            room_id: room.id.clone(),
            task_id: room.task_id,
            sender_id: sender.user_id,
            sender_email: sender.email.clone(),
            sender_name: sender_name(&sender.email),
            sender_role: role,
            message: text,
            message_type,
            is_read: false,
            read_at: None,
            edited_at: None,
            deleted_at: None,
            created_at: now,
        };

        self.store.insert_message(&message).await?;
        if let Err(e) = self
            .store
            .record_message_sent(&room.id, sender.user_id, role.counterpart(), now)
            .await
        {
            // The message is durable; its counters are re-derived on the
            // next mark-read.
            warn!(room_id = %room.id, message_id = %message.id, error = %e, "room counters not updated");
        }

        debug!(
            room_id = %room.id,
            task_id = room.task_id,
            user_id = sender.user_id,
            message_id = %message.id,
            "message sent"
        );
        Ok(message)
    }

    /// Marks the listed messages read for `reader_id` and returns the
    /// reader's recomputed unread count.
    ///
    /// Messages authored by the reader are skipped. The count comes from a
    /// fresh query and overwrites the room's counter, so concurrent sends
    /// never compound into drift.
    pub async fn mark_read(
        &self,
        room_id: &str,
        message_ids: &[String],
        reader_id: UserId,
    ) -> Result<u64, ChatError> {
        let room = self.room_for_member(room_id, reader_id).await?;
        let marked = if message_ids.is_empty() {
            0
        } else {
            self.store
                .mark_messages_read(&room.id, message_ids, reader_id, timestamp_now())
                .await?
        };

        let unread = self.store.count_unread(&room.id, reader_id).await?;
        self.store
            .set_unread_count(&room.id, resolve_role(&room, reader_id), unread)
            .await?;
        debug!(room_id = %room.id, user_id = reader_id, marked, unread, "messages marked read");
        Ok(unread)
    }

    /// Replaces the text of a TEXT message. Only its sender may edit it.
    pub async fn edit_message(
        &self,
        message_id: &str,
        editor_id: UserId,
        text: &str,
    ) -> Result<Message, ChatError> {
        let (room, mut message) = self.owned_message(message_id, editor_id, "edit").await?;
        if message.message_type != MessageType::Text {
            return Err(ChatError::Validation(
                "only text messages can be edited".into(),
            ));
        }
        let text = validate_text(text, self.limits.max_message_chars)?;
        ensure_active(&room)?;

        let now = timestamp_now();
        self.store.update_message_text(message_id, &text, now).await?;
        message.message = text;
        message.edited_at = Some(now);
        debug!(room_id = %room.id, message_id, "message edited");
        Ok(surface(&room, message))
    }

    /// Soft-deletes a message. Only its sender may delete it; the
    /// recipient's unread counter is recomputed afterwards.
    pub async fn delete_message(&self, message_id: &str, requester_id: UserId) -> Result<(), ChatError> {
        let (room, message) = self.owned_message(message_id, requester_id, "delete").await?;
        self.store
            .soft_delete_message(message_id, timestamp_now())
            .await?;

        if !message.is_read {
            let recipient = resolve_role(&room, message.sender_id).counterpart();
            let unread = self
                .store
                .count_unread(&room.id, party_id(&room, recipient))
                .await?;
            self.store.set_unread_count(&room.id, recipient, unread).await?;
        }
        debug!(room_id = %room.id, message_id, "message deleted");
        Ok(())
    }

    async fn owned_message(
        &self,
        message_id: &str,
        user_id: UserId,
        action: &str,
    ) -> Result<(Room, Message), ChatError> {
        let message = self
            .store
            .get_message(message_id)
            .await?
            .filter(|m| m.deleted_at.is_none())
            .ok_or_else(|| ChatError::NotFound("message not found".into()))?;
        if message.sender_id != user_id {
            return Err(ChatError::AccessDenied(format!(
                "only the sender can {action} a message"
            )));
        }
        let room = self
            .store
            .get_room(&message.room_id)
            .await?
            .ok_or_else(|| ChatError::NotFound("chat room not found".into()))?;
        Ok((room, message))
    }
}
