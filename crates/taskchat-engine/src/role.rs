// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Role resolution relative to a room.
//!
//! [`resolve_role`] is the only place a sender's role is decided. It runs
//! when a message is written and again whenever a message is handed to a
//! client, so a stored role that drifted from the room never reaches a UI.

use taskchat_core::{Message, Participant, Role, Room, UserId};

/// `owner` when `user_id` is the room's owner, `bidder` otherwise.
///
/// Users that are neither party (data anomalies) resolve to `bidder`.
pub fn resolve_role(room: &Room, user_id: UserId) -> Role {
    if user_id == room.owner_id {
        Role::Owner
    } else {
        Role::Bidder
    }
}

/// The counterpart of `user_id` in `room`.
pub fn other_party(room: &Room, user_id: UserId) -> Participant {
    match resolve_role(room, user_id) {
        Role::Owner => Participant {
            id: room.bidder_id,
            email: room.bidder_email.clone(),
            role: Role::Bidder,
        },
        Role::Bidder => Participant {
            id: room.owner_id,
            email: room.owner_email.clone(),
            role: Role::Owner,
        },
    }
}

/// User id holding `role` in `room`.
pub fn party_id(room: &Room, role: Role) -> UserId {
    match role {
        Role::Owner => room.owner_id,
        Role::Bidder => room.bidder_id,
    }
}

/// Display name derived from an email's local part.
pub fn sender_name(email: &str) -> String {
    match email.split_once('@') {
        Some((local, _)) if !local.is_empty() => local.to_string(),
        _ => email.to_string(),
    }
}

/// Re-derives the stored role before a message leaves the engine.
pub fn surface(room: &Room, mut message: Message) -> Message {
    message.sender_role = resolve_role(room, message.sender_id);
    message
}
