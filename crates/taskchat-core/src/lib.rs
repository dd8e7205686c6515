// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Taskchat.
//!
//! This crate provides the trait definitions, domain types, realtime wire
//! protocol and error type shared by every other crate in the workspace.

pub mod error;
pub mod protocol;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ChatError;
pub use protocol::{ChatEvent, ClientCommand, EventKind};
pub use types::{
    AdapterType, HealthStatus, Identity, Message, MessageType, Participant, Role, Room,
    RoomDetails, RoomOverview, RoomStatus, Session, TaskAssignment, TaskId, UnreadCount, UserId,
};

pub use traits::{ChatStore, IdentityGateway, PluginAdapter, TaskOwnershipProvider};
