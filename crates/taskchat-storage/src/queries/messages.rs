// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message queries.
//!
//! Listing is newest first and skips soft-deleted rows. `rowid` breaks ties
//! between messages created in the same millisecond, so insertion order wins.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use taskchat_core::{ChatError, UserId};

use crate::database::{Database, map_tr_err};
use crate::models::{MESSAGE_COLUMNS, Message, fmt_ts, message_from_row};
use crate::queries::rooms::ensure_changed;

pub async fn insert_message(db: &Database, message: &Message) -> Result<(), ChatError> {
    let m = message.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO messages ({MESSAGE_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
                ),
                params![
                    m.id,
                    m.room_id,
                    m.task_id,
                    m.sender_id,
                    m.sender_email,
                    m.sender_name,
                    m.sender_role.to_string(),
                    m.message,
                    m.message_type.to_string(),
                    m.is_read,
                    m.read_at.as_ref().map(fmt_ts),
                    m.edited_at.as_ref().map(fmt_ts),
                    m.deleted_at.as_ref().map(fmt_ts),
                    fmt_ts(&m.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_message(db: &Database, message_id: &str) -> Result<Option<Message>, ChatError> {
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![message_id],
                message_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_messages(
    db: &Database,
    room_id: &str,
    limit: u32,
    offset: u32,
) -> Result<Vec<Message>, ChatError> {
    let room_id = room_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE room_id = ?1 AND deleted_at IS NULL
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt.query_map(params![room_id, limit, offset], message_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn latest_message(db: &Database, room_id: &str) -> Result<Option<Message>, ChatError> {
    Ok(list_messages(db, room_id, 1, 0).await?.into_iter().next())
}

/// Mark the given messages read on behalf of `reader_id`.
///
/// Ids from other rooms, the reader's own messages, deleted messages and
/// already-read messages are left alone. Runs in one transaction.
pub async fn mark_messages_read(
    db: &Database,
    room_id: &str,
    message_ids: &[String],
    reader_id: UserId,
    at: DateTime<Utc>,
) -> Result<u64, ChatError> {
    let room_id = room_id.to_string();
    let ids = message_ids.to_vec();
    let at = fmt_ts(&at);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let mut changed = 0u64;
            {
                let mut stmt = tx.prepare(
                    "UPDATE messages SET is_read = 1, read_at = ?1
                     WHERE id = ?2 AND room_id = ?3 AND sender_id <> ?4
                       AND is_read = 0 AND deleted_at IS NULL",
                )?;
                for id in &ids {
                    changed += stmt.execute(params![at, id, room_id, reader_id])? as u64;
                }
            }
            tx.commit()?;
            Ok(changed)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn count_unread(db: &Database, room_id: &str, reader_id: UserId) -> Result<u64, ChatError> {
    let room_id = room_id.to_string();
    let count: i64 = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE room_id = ?1 AND sender_id <> ?2 AND is_read = 0 AND deleted_at IS NULL",
                params![room_id, reader_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(u64::try_from(count).unwrap_or(0))
}

pub async fn update_message_text(
    db: &Database,
    message_id: &str,
    text: &str,
    at: DateTime<Utc>,
) -> Result<(), ChatError> {
    let message_id = message_id.to_string();
    let text = text.to_string();
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET message = ?1, edited_at = ?2
                 WHERE id = ?3 AND deleted_at IS NULL",
                params![text, fmt_ts(&at), message_id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    ensure_changed(changed, "message")
}

pub async fn soft_delete_message(
    db: &Database,
    message_id: &str,
    at: DateTime<Utc>,
) -> Result<(), ChatError> {
    let message_id = message_id.to_string();
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
                params![fmt_ts(&at), message_id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    ensure_changed(changed, "message")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::rooms::insert_room;
    use crate::queries::test_support::{sample_message, sample_room, setup_db};
    use taskchat_core::types::timestamp_now;

    #[tokio::test]
    async fn listing_is_newest_first_with_insertion_tiebreak() {
        let (db, _dir) = setup_db().await;
        let room = sample_room(1, 10, 20);
        insert_room(&db, &room).await.unwrap();

        // Same timestamp for all three: rowid decides.
        let at = timestamp_now();
        for (i, text) in ["first", "second", "third"].into_iter().enumerate() {
            let mut m = sample_message(&room, 10, text);
            m.id = format!("m{i}");
            m.created_at = at;
            insert_message(&db, &m).await.unwrap();
        }

        let listed = list_messages(&db, &room.id, 50, 0).await.unwrap();
        let texts: Vec<_> = listed.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, vec!["third", "second", "first"]);

        let page = list_messages(&db, &room.id, 1, 1).await.unwrap();
        assert_eq!(page[0].message, "second");

        let latest = latest_message(&db, &room.id).await.unwrap().unwrap();
        assert_eq!(latest.message, "third");
    }

    #[tokio::test]
    async fn mark_read_skips_own_and_foreign_messages() {
        let (db, _dir) = setup_db().await;
        let room = sample_room(1, 10, 20);
        let other_room = sample_room(2, 10, 20);
        insert_room(&db, &room).await.unwrap();
        insert_room(&db, &other_room).await.unwrap();

        let from_owner = sample_message(&room, 10, "hello");
        let from_bidder = sample_message(&room, 20, "hi");
        let elsewhere = sample_message(&other_room, 10, "other room");
        for m in [&from_owner, &from_bidder, &elsewhere] {
            insert_message(&db, m).await.unwrap();
        }
        assert_eq!(count_unread(&db, &room.id, 20).await.unwrap(), 1);

        let ids = vec![
            from_owner.id.clone(),
            from_bidder.id.clone(),
            elsewhere.id.clone(),
        ];
        let changed = mark_messages_read(&db, &room.id, &ids, 20, timestamp_now())
            .await
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(count_unread(&db, &room.id, 20).await.unwrap(), 0);

        // The bidder's own message is still unread for the owner.
        assert_eq!(count_unread(&db, &room.id, 10).await.unwrap(), 1);
        let untouched = get_message(&db, &elsewhere.id).await.unwrap().unwrap();
        assert!(!untouched.is_read);

        // Marking again changes nothing.
        let again = mark_messages_read(&db, &room.id, &ids, 20, timestamp_now())
            .await
            .unwrap();
        assert_eq!(again, 0);
    }

    #[tokio::test]
    async fn edit_and_soft_delete() {
        let (db, _dir) = setup_db().await;
        let room = sample_room(1, 10, 20);
        insert_room(&db, &room).await.unwrap();
        let m = sample_message(&room, 10, "typo");
        insert_message(&db, &m).await.unwrap();

        let at = timestamp_now();
        update_message_text(&db, &m.id, "fixed", at).await.unwrap();
        let edited = get_message(&db, &m.id).await.unwrap().unwrap();
        assert_eq!(edited.message, "fixed");
        assert_eq!(edited.edited_at, Some(at));

        soft_delete_message(&db, &m.id, at).await.unwrap();
        assert!(list_messages(&db, &room.id, 50, 0).await.unwrap().is_empty());
        assert_eq!(count_unread(&db, &room.id, 20).await.unwrap(), 0);

        let err = soft_delete_message(&db, &m.id, at).await.unwrap_err();
        assert!(matches!(err, ChatError::NotFound(_)));
        let err = update_message_text(&db, &m.id, "again", at).await.unwrap_err();
        assert!(matches!(err, ChatError::NotFound(_)));
    }

    #[tokio::test]
    async fn oversized_text_is_rejected_by_schema() {
        let (db, _dir) = setup_db().await;
        let room = sample_room(1, 10, 20);
        insert_room(&db, &room).await.unwrap();
        let m = sample_message(&room, 10, &"x".repeat(2001));
        assert!(insert_message(&db, &m).await.is_err());
    }
}
