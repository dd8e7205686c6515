// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Room queries.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use taskchat_core::{ChatError, Role, RoomStatus, TaskId, UserId, types::timestamp_now};

use crate::database::{Database, is_unique_violation, map_tr_err};
use crate::models::{ROOM_COLUMNS, Room, fmt_ts, room_from_row};

/// Insert a room. A second ACTIVE room for the same task trips the partial
/// unique index and comes back as [`ChatError::Conflict`].
pub async fn insert_room(db: &Database, room: &Room) -> Result<(), ChatError> {
    let room = room.clone();
    db.connection()
        .call(move |conn| -> Result<Result<(), ChatError>, rusqlite::Error> {
            let inserted = conn.execute(
                &format!(
                    "INSERT INTO rooms ({ROOM_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
                ),
                params![
                    room.id,
                    room.task_id,
                    room.task_title,
                    room.owner_id,
                    room.owner_email,
                    room.bidder_id,
                    room.bidder_email,
                    room.status.to_string(),
                    fmt_ts(&room.last_message_at),
                    room.last_message_by,
                    room.unread_count.owner as i64,
                    room.unread_count.bidder as i64,
                    fmt_ts(&room.created_at),
                    fmt_ts(&room.updated_at),
                ],
            );
            match inserted {
                Ok(_) => Ok(Ok(())),
                Err(e) if is_unique_violation(&e) => Ok(Err(ChatError::Conflict(format!(
                    "an active room already exists for task {}",
                    room.task_id
                )))),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)?
}

pub async fn get_room(db: &Database, room_id: &str) -> Result<Option<Room>, ChatError> {
    let room_id = room_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?1"),
                params![room_id],
                room_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_active_room_by_task(
    db: &Database,
    task_id: TaskId,
) -> Result<Option<Room>, ChatError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE task_id = ?1 AND status = 'ACTIVE'"),
                params![task_id],
                room_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_latest_room_by_task(
    db: &Database,
    task_id: TaskId,
) -> Result<Option<Room>, ChatError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {ROOM_COLUMNS} FROM rooms WHERE task_id = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT 1"
                ),
                params![task_id],
                room_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// ACTIVE rooms where the user is owner or bidder, most recent activity first.
/// `limit = None` returns every room.
pub async fn list_rooms_for_user(
    db: &Database,
    user_id: UserId,
    limit: Option<u32>,
    offset: u32,
) -> Result<Vec<Room>, ChatError> {
    // SQLite treats a negative LIMIT as "no limit".
    let limit = limit.map(i64::from).unwrap_or(-1);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ROOM_COLUMNS} FROM rooms
                 WHERE (owner_id = ?1 OR bidder_id = ?1) AND status = 'ACTIVE'
                 ORDER BY last_message_at DESC, rowid DESC
                 LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt.query_map(params![user_id, limit, offset], room_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Bump the recipient's unread counter in place and stamp last-message
/// metadata. The increment happens inside SQLite, so concurrent sends never
/// lose an update.
pub async fn record_message_sent(
    db: &Database,
    room_id: &str,
    sender_id: UserId,
    recipient: Role,
    at: DateTime<Utc>,
) -> Result<(), ChatError> {
    let room_id = room_id.to_string();
    let sql = match recipient {
        Role::Owner => {
            "UPDATE rooms SET unread_owner = unread_owner + 1,
                 last_message_at = ?1, last_message_by = ?2, updated_at = ?1
             WHERE id = ?3"
        }
        Role::Bidder => {
            "UPDATE rooms SET unread_bidder = unread_bidder + 1,
                 last_message_at = ?1, last_message_by = ?2, updated_at = ?1
             WHERE id = ?3"
        }
    };
    let changed = db
        .connection()
        .call(move |conn| conn.execute(sql, params![fmt_ts(&at), sender_id, room_id]))
        .await
        .map_err(map_tr_err)?;
    ensure_changed(changed, "room")
}

pub async fn set_unread_count(
    db: &Database,
    room_id: &str,
    role: Role,
    count: u64,
) -> Result<(), ChatError> {
    let room_id = room_id.to_string();
    let sql = match role {
        Role::Owner => "UPDATE rooms SET unread_owner = ?1, updated_at = ?2 WHERE id = ?3",
        Role::Bidder => "UPDATE rooms SET unread_bidder = ?1, updated_at = ?2 WHERE id = ?3",
    };
    let count = i64::try_from(count).unwrap_or(i64::MAX);
    let now = fmt_ts(&timestamp_now());
    let changed = db
        .connection()
        .call(move |conn| conn.execute(sql, params![count, now, room_id]))
        .await
        .map_err(map_tr_err)?;
    ensure_changed(changed, "room")
}

pub async fn set_room_status(
    db: &Database,
    room_id: &str,
    status: RoomStatus,
) -> Result<(), ChatError> {
    let room_id = room_id.to_string();
    let now = fmt_ts(&timestamp_now());
    let changed = db
        .connection()
        .call(move |conn| -> Result<Result<usize, ChatError>, rusqlite::Error> {
            let updated = conn.execute(
                "UPDATE rooms SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.to_string(), now, room_id],
            );
            match updated {
                Ok(n) => Ok(Ok(n)),
                Err(e) if is_unique_violation(&e) => Ok(Err(ChatError::Conflict(
                    "another active room exists for this task".into(),
                ))),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)??;
    ensure_changed(changed, "room")
}

pub(crate) fn ensure_changed(changed: usize, what: &str) -> Result<(), ChatError> {
    if changed == 0 {
        Err(ChatError::NotFound(format!("{what} not found")))
    } else {
        Ok(())
    }
}
