// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime wire protocol.
//!
//! Every WebSocket text frame is a JSON object `{"event": "...", "data": {...}}`.
//! [`ClientCommand`] covers client-to-server frames, [`ChatEvent`] covers
//! server-to-client frames plus the local events a client raises itself
//! (`disconnected`, terminal `error`).

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ChatError;
use crate::types::{Message, MessageType, RoomDetails, TaskId, UserId};

/// Frames sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientCommand {
    JoinTaskRoom {
        task_id: TaskId,
    },
    SendMessage {
        task_id: TaskId,
        message: String,
        #[serde(default)]
        message_type: MessageType,
    },
    Typing {
        task_id: TaskId,
    },
    StopTyping {
        task_id: TaskId,
    },
    MarkMessagesRead {
        room_id: String,
        message_ids: Vec<String>,
    },
}

impl ClientCommand {
    pub fn to_frame(&self) -> Result<String, ChatError> {
        serde_json::to_string(self)
            .map_err(|e| ChatError::Internal(format!("failed to encode command: {e}")))
    }

    pub fn from_frame(text: &str) -> Result<Self, ChatError> {
        serde_json::from_str(text).map_err(|e| ChatError::Validation(format!("malformed frame: {e}")))
    }
}

/// Frames received by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ChatEvent {
    Connected {
        user_id: UserId,
        connection_id: String,
    },
    RoomJoined {
        room: RoomDetails,
        messages: Vec<Message>,
    },
    NewMessage(Message),
    UserTyping {
        user_id: UserId,
        is_typing: bool,
    },
    MessagesRead {
        room_id: String,
        unread_count: u64,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    Disconnected {
        reason: String,
    },
}

/// Discriminant of [`ChatEvent`], used as the listener registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum EventKind {
    Connected,
    RoomJoined,
    NewMessage,
    UserTyping,
    MessagesRead,
    Error,
    Disconnected,
}

impl ChatEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ChatEvent::Connected { .. } => EventKind::Connected,
            ChatEvent::RoomJoined { .. } => EventKind::RoomJoined,
            ChatEvent::NewMessage(_) => EventKind::NewMessage,
            ChatEvent::UserTyping { .. } => EventKind::UserTyping,
            ChatEvent::MessagesRead { .. } => EventKind::MessagesRead,
            ChatEvent::Error { .. } => EventKind::Error,
            ChatEvent::Disconnected { .. } => EventKind::Disconnected,
        }
    }

    /// In-band error event for a failed operation.
    pub fn from_error(err: &ChatError) -> Self {
        ChatEvent::Error {
            message: err.public_message(),
            code: Some(err.code().to_string()),
        }
    }

    pub fn to_frame(&self) -> Result<String, ChatError> {
        serde_json::to_string(self)
            .map_err(|e| ChatError::Internal(format!("failed to encode event: {e}")))
    }

    pub fn from_frame(text: &str) -> Result<Self, ChatError> {
        serde_json::from_str(text).map_err(|e| ChatError::Validation(format!("malformed frame: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_commands_use_kebab_events_and_camel_fields() {
        let cmd = ClientCommand::MarkMessagesRead {
            room_id: "r1".into(),
            message_ids: vec!["m1".into()],
        };
        let json: serde_json::Value = serde_json::from_str(&cmd.to_frame().unwrap()).unwrap();
        assert_eq!(json["event"], "mark-messages-read");
        assert_eq!(json["data"]["roomId"], "r1");
        assert_eq!(json["data"]["messageIds"][0], "m1");
    }

    #[test]
    fn send_message_defaults_to_text() {
        let cmd = ClientCommand::from_frame(
            r#"{"event":"send-message","data":{"taskId":42,"message":"hi"}}"#,
        )
        .unwrap();
        assert_eq!(
            cmd,
            ClientCommand::SendMessage {
                task_id: 42,
                message: "hi".into(),
                message_type: MessageType::Text,
            }
        );
    }

    #[test]
    fn unknown_event_is_a_validation_error() {
        let err = ClientCommand::from_frame(r#"{"event":"shout","data":{}}"#).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn error_event_carries_code() {
        let event = ChatEvent::from_error(&ChatError::AccessDenied("not a member".into()));
        let json: serde_json::Value = serde_json::from_str(&event.to_frame().unwrap()).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["data"]["message"], "not a member");
        assert_eq!(json["data"]["code"], "ACCESS_DENIED");
        assert_eq!(event.kind(), EventKind::Error);
    }

    #[test]
    fn typing_event_decodes() {
        let event = ChatEvent::from_frame(
            r#"{"event":"user-typing","data":{"userId":7,"isTyping":true}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ChatEvent::UserTyping {
                user_id: 7,
                is_typing: true
            }
        );
        assert_eq!(EventKind::UserTyping.to_string(), "user-typing");
    }
}
