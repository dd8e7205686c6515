// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-room broadcast groups and typing state.
//!
//! Each room's members and typing set live behind one async mutex, so joins,
//! leaves, typing changes and fan-out on the same room are serialized while
//! different rooms proceed independently. Empty groups are closed and
//! dropped from the map; a join that raced the close retries on a fresh
//! group.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use taskchat_core::{ChatEvent, TaskId, UserId};

struct Member {
    user_id: UserId,
    tx: mpsc::Sender<String>,
}

#[derive(Default)]
struct RoomGroup {
    members: HashMap<String, Member>,
    // user -> generation of their latest typing signal
    typing: HashMap<UserId, u64>,
    next_generation: u64,
    closed: bool,
}

impl RoomGroup {
    fn send(&self, frame: &str, exclude_user: Option<UserId>) -> usize {
        let mut delivered = 0;
        for (connection_id, member) in &self.members {
            if Some(member.user_id) == exclude_user {
                continue;
            }
            match member.tx.try_send(frame.to_owned()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(connection_id = %connection_id, error = %e, "dropping frame for slow connection"),
            }
        }
        delivered
    }

    fn has_user(&self, user_id: UserId) -> bool {
        self.members.values().any(|m| m.user_id == user_id)
    }
}

fn encode(event: &ChatEvent) -> Option<String> {
    match event.to_frame() {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(error = %e, "failed to encode event");
            None
        }
    }
}

fn typing_frame(user_id: UserId, is_typing: bool) -> Option<String> {
    encode(&ChatEvent::UserTyping { user_id, is_typing })
}

#[derive(Default)]
pub struct RoomHub {
    rooms: DashMap<TaskId, Arc<Mutex<RoomGroup>>>,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn existing(&self, task_id: TaskId) -> Option<Arc<Mutex<RoomGroup>>> {
        self.rooms.get(&task_id).map(|g| Arc::clone(g.value()))
    }

    /// Adds a connection to the room's broadcast group.
    pub async fn join(
        &self,
        task_id: TaskId,
        connection_id: &str,
        user_id: UserId,
        tx: mpsc::Sender<String>,
    ) {
        loop {
            let group = Arc::clone(self.rooms.entry(task_id).or_default().value());
            let mut inner = group.lock().await;
            if inner.closed {
                continue;
            }
            inner.members.insert(
                connection_id.to_string(),
                Member {
                    user_id,
                    tx: tx.clone(),
                },
            );
            debug!(task_id, connection_id, user_id, members = inner.members.len(), "joined room group");
            return;
        }
    }

    /// Removes a connection from the room's group. When the user's last
    /// connection leaves while typing, the others see `isTyping=false`.
    pub async fn leave(&self, task_id: TaskId, connection_id: &str) {
        let Some(group) = self.existing(task_id) else {
            return;
        };
        let mut inner = group.lock().await;
        let Some(member) = inner.members.remove(connection_id) else {
            return;
        };

        if !inner.has_user(member.user_id) && inner.typing.remove(&member.user_id).is_some() {
            if let Some(frame) = typing_frame(member.user_id, false) {
                inner.send(&frame, Some(member.user_id));
            }
        }

        if inner.members.is_empty() {
            inner.closed = true;
            self.rooms.remove_if(&task_id, |_, g| Arc::ptr_eq(g, &group));
            debug!(task_id, "room group closed");
        }
    }

    /// Sends `event` to every connection in the room except those of
    /// `exclude_user`. Returns the number of connections reached.
    pub async fn broadcast(
        &self,
        task_id: TaskId,
        event: &ChatEvent,
        exclude_user: Option<UserId>,
    ) -> usize {
        let Some(group) = self.existing(task_id) else {
            return 0;
        };
        let Some(frame) = encode(event) else {
            return 0;
        };
        let inner = group.lock().await;
        inner.send(&frame, exclude_user)
    }

    /// Marks `user_id` as typing and tells the other members. Returns the
    /// generation that a later [`RoomHub::expire_typing`] must present.
    pub async fn set_typing(&self, task_id: TaskId, user_id: UserId) -> Option<u64> {
        let group = self.existing(task_id)?;
        let mut inner = group.lock().await;
        inner.next_generation += 1;
        let generation = inner.next_generation;
        inner.typing.insert(user_id, generation);
        if let Some(frame) = typing_frame(user_id, true) {
            inner.send(&frame, Some(user_id));
        }
        Some(generation)
    }

    /// Clears the typing flag only if no newer typing signal arrived since
    /// `generation` was issued.
    pub async fn expire_typing(&self, task_id: TaskId, user_id: UserId, generation: u64) -> bool {
        let Some(group) = self.existing(task_id) else {
            return false;
        };
        let mut inner = group.lock().await;
        if inner.typing.get(&user_id) != Some(&generation) {
            return false;
        }
        inner.typing.remove(&user_id);
        if let Some(frame) = typing_frame(user_id, false) {
            inner.send(&frame, Some(user_id));
        }
        debug!(task_id, user_id, "typing indicator expired");
        true
    }

    /// Explicit stop: always tells the other members.
    pub async fn stop_typing(&self, task_id: TaskId, user_id: UserId) {
        let Some(group) = self.existing(task_id) else {
            return;
        };
        let mut inner = group.lock().await;
        inner.typing.remove(&user_id);
        if let Some(frame) = typing_frame(user_id, false) {
            inner.send(&frame, Some(user_id));
        }
    }

    pub async fn typing_users(&self, task_id: TaskId) -> Vec<UserId> {
        let Some(group) = self.existing(task_id) else {
            return Vec::new();
        };
        let inner = group.lock().await;
        let mut users: Vec<UserId> = inner.typing.keys().copied().collect();
        users.sort_unstable();
        users
    }

    pub async fn member_count(&self, task_id: TaskId) -> usize {
        match self.existing(task_id) {
            Some(group) => group.lock().await.members.len(),
            None => 0,
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
        mpsc::channel(16)
    }

    fn next_event(rx: &mut mpsc::Receiver<String>) -> Option<ChatEvent> {
        rx.try_recv().ok().map(|f| ChatEvent::from_frame(&f).unwrap())
    }

    #[tokio::test]
    async fn broadcast_reaches_all_members_or_all_but_one_user() {
        let hub = RoomHub::new();
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();
        hub.join(42, "c1", 1, tx1).await;
        hub.join(42, "c2", 2, tx2).await;

        let event = ChatEvent::Disconnected {
            reason: "test".into(),
        };
        assert_eq!(hub.broadcast(42, &event, None).await, 2);
        assert_eq!(hub.broadcast(42, &event, Some(1)).await, 1);
        assert!(next_event(&mut rx1).is_some());
        assert!(next_event(&mut rx1).is_none());
        assert!(next_event(&mut rx2).is_some());
        assert!(next_event(&mut rx2).is_some());
        assert_eq!(hub.broadcast(7, &event, None).await, 0);
    }

    #[tokio::test]
    async fn empty_groups_are_dropped_and_rejoinable() {
        let hub = RoomHub::new();
        let (tx, _rx) = channel();
        hub.join(42, "c1", 1, tx.clone()).await;
        assert_eq!(hub.room_count(), 1);
        hub.leave(42, "c1").await;
        assert_eq!(hub.room_count(), 0);
        assert_eq!(hub.member_count(42).await, 0);

        hub.join(42, "c1", 1, tx).await;
        assert_eq!(hub.member_count(42).await, 1);
        assert_eq!(hub.room_count(), 1);
    }

    #[tokio::test]
    async fn typing_is_broadcast_to_others_only() {
        let hub = RoomHub::new();
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();
        hub.join(42, "c1", 1, tx1).await;
        hub.join(42, "c2", 2, tx2).await;

        hub.set_typing(42, 1).await.unwrap();
        assert!(next_event(&mut rx1).is_none());
        assert_eq!(
            next_event(&mut rx2),
            Some(ChatEvent::UserTyping {
                user_id: 1,
                is_typing: true
            })
        );
        assert_eq!(hub.typing_users(42).await, vec![1]);
    }

    #[tokio::test]
    async fn stale_expiry_does_not_clear_fresh_typing() {
        let hub = RoomHub::new();
        let (tx1, _rx1) = channel();
        let (tx2, mut rx2) = channel();
        hub.join(42, "c1", 1, tx1).await;
        hub.join(42, "c2", 2, tx2).await;

        let first = hub.set_typing(42, 1).await.unwrap();
        let second = hub.set_typing(42, 1).await.unwrap();
        assert!(!hub.expire_typing(42, 1, first).await);
        assert_eq!(hub.typing_users(42).await, vec![1]);
        assert!(hub.expire_typing(42, 1, second).await);
        assert!(hub.typing_users(42).await.is_empty());

        let frames: Vec<ChatEvent> = std::iter::from_fn(|| next_event(&mut rx2)).collect();
        assert_eq!(
            frames.last(),
            Some(&ChatEvent::UserTyping {
                user_id: 1,
                is_typing: false
            })
        );
    }

    #[tokio::test]
    async fn leaving_while_typing_clears_the_flag() {
        let hub = RoomHub::new();
        let (tx1, _rx1) = channel();
        let (tx2, mut rx2) = channel();
        hub.join(42, "c1", 1, tx1).await;
        hub.join(42, "c2", 2, tx2).await;
        hub.set_typing(42, 1).await;
        let _ = next_event(&mut rx2);

        hub.leave(42, "c1").await;
        assert_eq!(
            next_event(&mut rx2),
            Some(ChatEvent::UserTyping {
                user_id: 1,
                is_typing: false
            })
        );
        assert!(hub.typing_users(42).await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_joins_and_leaves_keep_a_consistent_group() {
        let hub = Arc::new(RoomHub::new());
        let mut tasks = Vec::new();
        for i in 0..50 {
            let hub = Arc::clone(&hub);
            tasks.push(tokio::spawn(async move {
                let (tx, _rx) = mpsc::channel(1);
                let id = format!("c{i}");
                hub.join(42, &id, i, tx).await;
                if i % 2 == 0 {
                    hub.leave(42, &id).await;
                }
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(hub.member_count(42).await, 25);
    }
}
