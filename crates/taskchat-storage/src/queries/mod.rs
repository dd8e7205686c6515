// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query functions, one module per table.

pub mod messages;
pub mod rooms;
pub mod sessions;

#[cfg(test)]
pub(crate) mod test_support {
    use taskchat_core::types::{new_id, timestamp_now};
    use taskchat_core::{Message, MessageType, Role, Room, RoomStatus, UnreadCount, UserId};
    use tempfile::TempDir;

    use crate::database::Database;

    pub async fn setup_db() -> (Database, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap(), true).await.unwrap();
        (db, dir)
    }

    pub fn sample_room(task_id: i64, owner_id: UserId, bidder_id: UserId) -> Room {
        let now = timestamp_now();
        Room {
            id: new_id(),
            task_id,
            task_title: Some(format!("Task {task_id}")),
            owner_id,
            owner_email: format!("user{owner_id}@example.com"),
            bidder_id,
            bidder_email: format!("user{bidder_id}@example.com"),
            status: RoomStatus::Active,
            last_message_at: now,
            last_message_by: None,
            unread_count: UnreadCount::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn sample_message(room: &Room, sender_id: UserId, text: &str) -> Message {
        let role = if sender_id == room.owner_id {
            Role::Owner
        } else {
            Role::Bidder
        };
        Message {
            id: new_id(),
            room_id: room.id.clone(),
            task_id: room.task_id,
            sender_id,
            sender_email: format!("user{sender_id}@example.com"),
            sender_name: format!("user{sender_id}"),
            sender_role: role,
            message: text.to_string(),
            message_type: MessageType::Text,
            is_read: false,
            read_at: None,
            edited_at: None,
            deleted_at: None,
            created_at: timestamp_now(),
        }
    }
}
