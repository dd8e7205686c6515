// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` runs the real gateway (router, session manager, engine and
//! SQLite store) on `127.0.0.1:0` with mock identity and task adapters.
//! Tests drive it through [`ChatClient`]s or plain HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use taskchat_client::{ChatClient, ClientSettings};
use taskchat_config::model::{ChatConfig, ServerConfig, StorageConfig};
use taskchat_core::{
    ChatError, ChatEvent, ChatStore, EventKind, IdentityGateway, TaskAssignment,
    TaskOwnershipProvider, UserId,
};
use taskchat_engine::ChatEngine;
use taskchat_gateway::{GatewayState, SessionManager};
use taskchat_storage::SqliteStore;

use crate::mock_identity::{StaticIdentityGateway, token_for};
use crate::mock_tasks::StaticTaskProvider;

const ALL_EVENTS: [EventKind; 7] = [
    EventKind::Connected,
    EventKind::RoomJoined,
    EventKind::NewMessage,
    EventKind::UserTyping,
    EventKind::MessagesRead,
    EventKind::Error,
    EventKind::Disconnected,
];

/// Opens an initialized SQLite store in a fresh temp directory.
///
/// The directory is deleted when the returned guard drops.
pub async fn temp_store() -> Result<(tempfile::TempDir, Arc<SqliteStore>), ChatError> {
    let temp_dir = tempfile::TempDir::new().map_err(|e| ChatError::Storage { source: e.into() })?;
    let store = SqliteStore::new(StorageConfig {
        database_path: temp_dir.path().join("test.db").to_string_lossy().to_string(),
        wal_mode: true,
    });
    store.initialize().await?;
    Ok((temp_dir, Arc::new(store)))
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    tasks: Vec<TaskAssignment>,
    users: Vec<UserId>,
    chat: ChatConfig,
    server: ServerConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            tasks: Vec::new(),
            users: Vec::new(),
            chat: ChatConfig::default(),
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                // Off unless a test opts in.
                rate_limit_requests: 0,
                ..ServerConfig::default()
            },
        }
    }

    /// Make a task known to the mock task service.
    pub fn with_task(mut self, task: TaskAssignment) -> Self {
        self.tasks.push(task);
        self
    }

    /// Accept `token_for(user_id)` at the handshake.
    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.users.push(user_id);
        self
    }

    pub fn with_chat_config(mut self, chat: ChatConfig) -> Self {
        self.chat = chat;
        self
    }

    /// Limit each user to `requests` REST calls per `window_secs`.
    pub fn with_rate_limit(mut self, requests: u32, window_secs: u64) -> Self {
        self.server.rate_limit_requests = requests;
        self.server.rate_limit_window_secs = window_secs;
        self
    }

    /// Opens the store, wires the engine and starts serving.
    pub async fn build(self) -> Result<TestHarness, ChatError> {
        let (temp_dir, store) = temp_store().await?;

        let identity = Arc::new(
            self.users
                .iter()
                .fold(StaticIdentityGateway::new(), |gw, user| gw.with_user(*user)),
        );
        let tasks = Arc::new(
            self.tasks
                .into_iter()
                .fold(StaticTaskProvider::new(), StaticTaskProvider::with_task),
        );

        let engine = Arc::new(ChatEngine::new(
            Arc::clone(&store) as Arc<dyn ChatStore>,
            Arc::clone(&tasks) as Arc<dyn TaskOwnershipProvider>,
            self.chat,
        ));

        let shutdown = CancellationToken::new();
        let state = GatewayState::new(
            Arc::clone(&engine),
            Arc::clone(&identity) as Arc<dyn IdentityGateway>,
            shutdown.clone(),
        );
        let sessions = Arc::clone(&state.sessions);

        let listener = taskchat_gateway::bind(&self.server).await?;
        let addr = listener.local_addr().map_err(|e| ChatError::Connection {
            message: "listener has no local address".into(),
            source: Some(Box::new(e)),
        })?;
        let server = tokio::spawn(taskchat_gateway::serve(listener, state, self.server));

        Ok(TestHarness {
            addr,
            engine,
            store,
            tasks,
            identity,
            sessions,
            shutdown,
            server: Some(server),
            _temp_dir: temp_dir,
        })
    }
}

/// A running gateway with mock adapters and temp storage.
pub struct TestHarness {
    pub addr: SocketAddr,
    pub engine: Arc<ChatEngine>,
    /// SQLite store (temp DB, cleaned up on drop).
    pub store: Arc<SqliteStore>,
    pub tasks: Arc<StaticTaskProvider>,
    pub identity: Arc<StaticIdentityGateway>,
    pub sessions: Arc<SessionManager>,
    shutdown: CancellationToken,
    server: Option<JoinHandle<Result<(), ChatError>>>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Client settings with short timings suited to tests.
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            url: self.ws_url(),
            handshake_timeout: Duration::from_secs(2),
            max_reconnect_attempts: 2,
            reconnect_delay: Duration::from_millis(50),
        }
    }

    /// Connects a fresh client as `user_id`, with an [`EventLog`] attached
    /// before the handshake so the `connected` event is captured.
    pub async fn connect(&self, user_id: UserId) -> Result<(ChatClient, EventLog), ChatError> {
        let client = ChatClient::new(self.client_settings());
        let log = EventLog::attach(&client);
        client.connect(&token_for(user_id)).await?;
        Ok((client, log))
    }

    /// Stops the server; open sockets receive `disconnected` first.
    pub async fn shutdown(&mut self) {
        self.shutdown.cancel();
        if let Some(server) = self.server.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), server).await;
        }
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Every event a client raises, in order.
pub struct EventLog {
    rx: mpsc::UnboundedReceiver<ChatEvent>,
}

impl EventLog {
    pub fn attach(client: &ChatClient) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        for kind in ALL_EVENTS {
            let tx = tx.clone();
            client.on(kind, move |event| {
                let _ = tx.send(event.clone());
            });
        }
        Self { rx }
    }

    /// Next event of `kind`, skipping others, or `None` after `within`.
    pub async fn wait_for(&mut self, kind: EventKind, within: Duration) -> Option<ChatEvent> {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            let event = tokio::time::timeout_at(deadline, self.rx.recv()).await.ok()??;
            if event.kind() == kind {
                return Some(event);
            }
        }
    }

    /// Events already delivered, without waiting.
    pub fn drain(&mut self) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}
