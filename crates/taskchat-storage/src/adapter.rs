// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`ChatStore`] trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use taskchat_config::model::StorageConfig;
use taskchat_core::{
    AdapterType, ChatError, ChatStore, HealthStatus, Message, PluginAdapter, Role, Room,
    RoomStatus, Session, TaskId, UserId,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed chat store.
///
/// The database is opened lazily by [`ChatStore::initialize`]; every other
/// call fails with a storage error until then.
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// The database is not opened until [`ChatStore::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, ChatError> {
        self.db.get().ok_or_else(|| ChatError::Storage {
            source: "store not initialized, call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.query_row("SELECT 1", [], |_| Ok(()))?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ChatError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl ChatStore for SqliteStore {
    async fn initialize(&self) -> Result<(), ChatError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| ChatError::Storage {
            source: "store already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite store initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ChatError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- rooms ---

    async fn insert_room(&self, room: &Room) -> Result<(), ChatError> {
        queries::rooms::insert_room(self.db()?, room).await
    }

    async fn get_room(&self, room_id: &str) -> Result<Option<Room>, ChatError> {
        queries::rooms::get_room(self.db()?, room_id).await
    }

    async fn find_active_room_by_task(&self, task_id: TaskId) -> Result<Option<Room>, ChatError> {
        queries::rooms::find_active_room_by_task(self.db()?, task_id).await
    }

    async fn find_latest_room_by_task(&self, task_id: TaskId) -> Result<Option<Room>, ChatError> {
        queries::rooms::find_latest_room_by_task(self.db()?, task_id).await
    }

    async fn list_rooms_for_user(
        &self,
        user_id: UserId,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<Vec<Room>, ChatError> {
        queries::rooms::list_rooms_for_user(self.db()?, user_id, limit, offset).await
    }

    async fn record_message_sent(
        &self,
        room_id: &str,
        sender_id: UserId,
        recipient: Role,
        at: DateTime<Utc>,
    ) -> Result<(), ChatError> {
        queries::rooms::record_message_sent(self.db()?, room_id, sender_id, recipient, at).await
    }

    async fn set_unread_count(&self, room_id: &str, role: Role, count: u64) -> Result<(), ChatError> {
        queries::rooms::set_unread_count(self.db()?, room_id, role, count).await
    }

    async fn set_room_status(&self, room_id: &str, status: RoomStatus) -> Result<(), ChatError> {
        queries::rooms::set_room_status(self.db()?, room_id, status).await
    }

    // --- messages ---

    async fn insert_message(&self, message: &Message) -> Result<(), ChatError> {
        queries::messages::insert_message(self.db()?, message).await
    }

    async fn get_message(&self, message_id: &str) -> Result<Option<Message>, ChatError> {
        queries::messages::get_message(self.db()?, message_id).await
    }

    async fn list_messages(
        &self,
        room_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>, ChatError> {
        queries::messages::list_messages(self.db()?, room_id, limit, offset).await
    }

    async fn latest_message(&self, room_id: &str) -> Result<Option<Message>, ChatError> {
        queries::messages::latest_message(self.db()?, room_id).await
    }

    async fn mark_messages_read(
        &self,
        room_id: &str,
        message_ids: &[String],
        reader_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<u64, ChatError> {
        queries::messages::mark_messages_read(self.db()?, room_id, message_ids, reader_id, at)
            .await
    }

    async fn count_unread(&self, room_id: &str, reader_id: UserId) -> Result<u64, ChatError> {
        queries::messages::count_unread(self.db()?, room_id, reader_id).await
    }

    async fn update_message_text(
        &self,
        message_id: &str,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ChatError> {
        queries::messages::update_message_text(self.db()?, message_id, text, at).await
    }

    async fn soft_delete_message(&self, message_id: &str, at: DateTime<Utc>) -> Result<(), ChatError> {
        queries::messages::soft_delete_message(self.db()?, message_id, at).await
    }

    // --- presence ---

    async fn create_session(&self, session: &Session) -> Result<(), ChatError> {
        queries::sessions::create_session(self.db()?, session).await
    }

    async fn set_session_room(
        &self,
        connection_id: &str,
        room_id: Option<&str>,
    ) -> Result<(), ChatError> {
        queries::sessions::set_session_room(self.db()?, connection_id, room_id).await
    }

    async fn mark_session_offline(
        &self,
        connection_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ChatError> {
        queries::sessions::mark_session_offline(self.db()?, connection_id, at).await
    }

    async fn list_online_sessions(&self, user_id: UserId) -> Result<Vec<Session>, ChatError> {
        queries::sessions::list_online_sessions(self.db()?, user_id).await
    }

    async fn reap_stale_sessions(&self, cutoff: DateTime<Utc>) -> Result<u64, ChatError> {
        queries::sessions::reap_stale_sessions(self.db()?, cutoff).await
    }
}
