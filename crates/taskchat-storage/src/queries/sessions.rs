// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Presence session queries.

use chrono::{DateTime, Utc};
use rusqlite::params;
use taskchat_core::{ChatError, UserId, types::timestamp_now};

use crate::database::{Database, map_tr_err};
use crate::models::{SESSION_COLUMNS, Session, fmt_ts, session_from_row};

/// Record a new connection. Reusing a connection id replaces the old row.
pub async fn create_session(db: &Database, session: &Session) -> Result<(), ChatError> {
    let s = session.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO sessions ({SESSION_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ),
                params![
                    s.connection_id,
                    s.user_id,
                    s.email,
                    s.is_online,
                    fmt_ts(&s.last_seen),
                    s.current_room,
                    fmt_ts(&s.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_session_room(
    db: &Database,
    connection_id: &str,
    room_id: Option<&str>,
) -> Result<(), ChatError> {
    let connection_id = connection_id.to_string();
    let room_id = room_id.map(str::to_string);
    let now = fmt_ts(&timestamp_now());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET current_room = ?1, last_seen = ?2 WHERE connection_id = ?3",
                params![room_id, now, connection_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn mark_session_offline(
    db: &Database,
    connection_id: &str,
    at: DateTime<Utc>,
) -> Result<(), ChatError> {
    let connection_id = connection_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET is_online = 0, current_room = NULL, last_seen = ?1
                 WHERE connection_id = ?2",
                params![fmt_ts(&at), connection_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_online_sessions(db: &Database, user_id: UserId) -> Result<Vec<Session>, ChatError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE user_id = ?1 AND is_online = 1
                 ORDER BY created_at, rowid"
            ))?;
            let rows = stmt.query_map(params![user_id], session_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Delete offline sessions last seen before `cutoff`.
pub async fn reap_stale_sessions(db: &Database, cutoff: DateTime<Utc>) -> Result<u64, ChatError> {
    let cutoff = fmt_ts(&cutoff);
    let deleted = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM sessions WHERE is_online = 0 AND last_seen < ?1",
                params![cutoff],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(deleted as u64)
}
