// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row mapping between SQLite and the domain types in `taskchat-core`.
//!
//! Timestamps are stored as RFC 3339 text with millisecond precision
//! (`2026-01-01T00:00:00.000Z`) so lexical order equals time order.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

pub use taskchat_core::types::{Message, Room, Session};
use taskchat_core::{MessageType, Role, RoomStatus, UnreadCount};

pub(crate) const ROOM_COLUMNS: &str = "id, task_id, task_title, owner_id, owner_email, bidder_id, \
     bidder_email, status, last_message_at, last_message_by, unread_owner, unread_bidder, \
     created_at, updated_at";

pub(crate) const MESSAGE_COLUMNS: &str = "id, room_id, task_id, sender_id, sender_email, \
     sender_name, sender_role, message, message_type, is_read, read_at, edited_at, deleted_at, \
     created_at";

pub(crate) const SESSION_COLUMNS: &str =
    "connection_id, user_id, email, is_online, last_seen, current_room, created_at";

pub(crate) fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

fn opt_ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| parse_ts(idx, &r)).transpose()
}

fn enum_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = strum::ParseError>,
{
    let raw: String = row.get(idx)?;
    T::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn count_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(idx)?;
    Ok(u64::try_from(raw).unwrap_or(0))
}

pub(crate) fn room_from_row(row: &Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: row.get(0)?,
        task_id: row.get(1)?,
        task_title: row.get(2)?,
        owner_id: row.get(3)?,
        owner_email: row.get(4)?,
        bidder_id: row.get(5)?,
        bidder_email: row.get(6)?,
        status: enum_at::<RoomStatus>(row, 7)?,
        last_message_at: ts_at(row, 8)?,
        last_message_by: row.get(9)?,
        unread_count: UnreadCount {
            owner: count_at(row, 10)?,
            bidder: count_at(row, 11)?,
        },
        created_at: ts_at(row, 12)?,
        updated_at: ts_at(row, 13)?,
    })
}

pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        room_id: row.get(1)?,
        task_id: row.get(2)?,
        sender_id: row.get(3)?,
        sender_email: row.get(4)?,
        sender_name: row.get(5)?,
        sender_role: enum_at::<Role>(row, 6)?,
        message: row.get(7)?,
        message_type: enum_at::<MessageType>(row, 8)?,
        is_read: row.get(9)?,
        read_at: opt_ts_at(row, 10)?,
        edited_at: opt_ts_at(row, 11)?,
        deleted_at: opt_ts_at(row, 12)?,
        created_at: ts_at(row, 13)?,
    })
}

pub(crate) fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        connection_id: row.get(0)?,
        user_id: row.get(1)?,
        email: row.get(2)?,
        is_online: row.get(3)?,
        last_seen: ts_at(row, 4)?,
        current_room: row.get(5)?,
        created_at: ts_at(row, 6)?,
    })
}
