// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the engine, storage, gateway and client crates.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Numeric user id as issued by the identity provider.
pub type UserId = i64;

/// Numeric task id as issued by the task service.
pub type TaskId = i64;

/// Health status reported by an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Store,
    Identity,
    Tasks,
}

/// A participant's role inside one room.
///
/// Roles are never stored authoritatively: they are derived from the room's
/// owner id every time a message is surfaced.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Owner,
    Bidder,
}

impl Role {
    /// The role on the other side of the conversation.
    pub fn counterpart(self) -> Role {
        match self {
            Role::Owner => Role::Bidder,
            Role::Bidder => Role::Owner,
        }
    }
}

/// Lifecycle state of a room.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum RoomStatus {
    Active,
    Archived,
    Blocked,
}

/// Kind of message payload.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum MessageType {
    #[default]
    Text,
    File,
    Image,
    System,
}

/// Per-role unread counters kept on the room row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    pub owner: u64,
    pub bidder: u64,
}

impl UnreadCount {
    pub fn for_role(&self, role: Role) -> u64 {
        match role {
            Role::Owner => self.owner,
            Role::Bidder => self.bidder,
        }
    }
}

/// The conversation container bound to exactly one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub task_id: TaskId,
    pub task_title: Option<String>,
    pub owner_id: UserId,
    pub owner_email: String,
    pub bidder_id: UserId,
    pub bidder_email: String,
    pub status: RoomStatus,
    pub last_message_at: DateTime<Utc>,
    pub last_message_by: Option<UserId>,
    pub unread_count: UnreadCount,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    /// True when `user_id` is the owner or the bidder of this room.
    pub fn is_member(&self, user_id: UserId) -> bool {
        user_id == self.owner_id || user_id == self.bidder_id
    }
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub room_id: String,
    pub task_id: TaskId,
    pub sender_id: UserId,
    pub sender_email: String,
    pub sender_name: String,
    /// Role stamped at write time. Surfaced copies carry the role recomputed
    /// from the room's owner instead.
    pub sender_role: Role,
    pub message: String,
    pub message_type: MessageType,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Presence record for one realtime connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub connection_id: String,
    pub user_id: UserId,
    pub email: String,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
    pub current_room: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The authenticated caller, produced by an identity gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: UserId,
    pub email: String,
    pub role: String,
}

/// Owner and assignee of a task, as reported by the task service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssignment {
    pub task_id: TaskId,
    pub title: Option<String>,
    pub owner_id: UserId,
    pub owner_email: String,
    pub assigned_user_id: Option<UserId>,
    pub assigned_user_email: Option<String>,
    pub status: Option<String>,
}

/// The other side of a conversation, from one member's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: UserId,
    pub email: String,
    pub role: Role,
}

/// Room metadata as sent in `room-joined` and the room lookup endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDetails {
    #[serde(flatten)]
    pub room: Room,
    pub other_user: Participant,
}

/// Entry of a user's room list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomOverview {
    #[serde(flatten)]
    pub room: Room,
    pub other_user: Participant,
    pub last_message: Option<Message>,
}

/// Current UTC time truncated to the millisecond precision used on disk.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Generates a new opaque identifier for rooms, messages and connections.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_counterpart_flips() {
        assert_eq!(Role::Owner.counterpart(), Role::Bidder);
        assert_eq!(Role::Bidder.counterpart(), Role::Owner);
    }

    #[test]
    fn enums_use_wire_spelling() {
        assert_eq!(RoomStatus::Active.to_string(), "ACTIVE");
        assert_eq!(MessageType::Text.to_string(), "TEXT");
        assert_eq!(Role::Bidder.to_string(), "bidder");
        assert_eq!(
            serde_json::to_string(&RoomStatus::Blocked).unwrap(),
            "\"BLOCKED\""
        );
        assert_eq!(serde_json::to_string(&Role::Owner).unwrap(), "\"owner\"");
    }

    #[test]
    fn unread_for_role() {
        let counts = UnreadCount {
            owner: 2,
            bidder: 5,
        };
        assert_eq!(counts.for_role(Role::Owner), 2);
        assert_eq!(counts.for_role(Role::Bidder), 5);
    }

    #[test]
    fn timestamps_are_millisecond_precision() {
        let now = timestamp_now();
        assert_eq!(now.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn room_details_flatten_room_fields() {
        let now = timestamp_now();
        let room = Room {
            id: "r1".into(),
            task_id: 42,
            task_title: Some("Fix sink".into()),
            owner_id: 1,
            owner_email: "owner@example.com".into(),
            bidder_id: 2,
            bidder_email: "bidder@example.com".into(),
            status: RoomStatus::Active,
            last_message_at: now,
            last_message_by: None,
            unread_count: UnreadCount::default(),
            created_at: now,
            updated_at: now,
        };
        assert!(room.is_member(1));
        assert!(room.is_member(2));
        assert!(!room.is_member(3));

        let details = RoomDetails {
            room,
            other_user: Participant {
                id: 2,
                email: "bidder@example.com".into(),
                role: Role::Bidder,
            },
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["taskId"], 42);
        assert_eq!(json["otherUser"]["role"], "bidder");
        assert_eq!(json["unreadCount"]["owner"], 0);
    }
}
