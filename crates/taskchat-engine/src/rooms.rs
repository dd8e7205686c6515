// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Room lifecycle: lazy creation, membership and status changes.

use tracing::{debug, info};

use taskchat_core::types::{new_id, timestamp_now};
use taskchat_core::{
    ChatError, Room, RoomDetails, RoomOverview, RoomStatus, TaskAssignment, TaskId, UnreadCount,
    UserId,
};

use crate::ChatEngine;
use crate::role::{other_party, resolve_role, surface};

fn not_a_member() -> ChatError {
    ChatError::AccessDenied("you are not a participant of this chat".into())
}

fn ensure_member(room: &Room, user_id: UserId) -> Result<(), ChatError> {
    if room.is_member(user_id) {
        Ok(())
    } else {
        Err(not_a_member())
    }
}

impl ChatEngine {
    /// Returns the task's ACTIVE room, creating it on first use.
    ///
    /// Membership of an existing room is checked against the room's stored
    /// ids; the task service is consulted only when a room must be created.
    /// Concurrent first joins race on the store's unique ACTIVE-room key and
    /// the loser re-reads the winner's room.
    pub async fn get_or_create_room(
        &self,
        task_id: TaskId,
        user_id: UserId,
    ) -> Result<Room, ChatError> {
        if let Some(room) = self.store.find_active_room_by_task(task_id).await? {
            ensure_member(&room, user_id)?;
            return Ok(room);
        }

        let latest = self.store.find_latest_room_by_task(task_id).await?;
        if latest.is_some_and(|room| room.status == RoomStatus::Blocked) {
            return Err(ChatError::AccessDenied(
                "chat for this task has been blocked".into(),
            ));
        }

        let task = self.tasks.task_assignment(task_id).await?;
        let room = new_room(&task, user_id)?;

        match self.store.insert_room(&room).await {
            Ok(()) => {
                info!(
                    task_id,
                    room_id = %room.id,
                    owner_id = room.owner_id,
                    bidder_id = room.bidder_id,
                    "chat room created"
                );
                Ok(room)
            }
            Err(ChatError::Conflict(_)) => {
                debug!(task_id, user_id, "room created concurrently, using existing room");
                let winner = self
                    .store
                    .find_active_room_by_task(task_id)
                    .await?
                    .ok_or_else(|| {
                        ChatError::Internal(format!("active room for task {task_id} vanished"))
                    })?;
                ensure_member(&winner, user_id)?;
                Ok(winner)
            }
            Err(e) => Err(e),
        }
    }

    /// The task's ACTIVE room, without creating one.
    pub async fn get_room_by_task(
        &self,
        task_id: TaskId,
        user_id: UserId,
    ) -> Result<Room, ChatError> {
        let room = self
            .store
            .find_active_room_by_task(task_id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("no chat room for task {task_id}")))?;
        ensure_member(&room, user_id)?;
        Ok(room)
    }

    /// Looks up a room by id and checks that `user_id` belongs to it.
    pub async fn room_for_member(&self, room_id: &str, user_id: UserId) -> Result<Room, ChatError> {
        let room = self
            .store
            .get_room(room_id)
            .await?
            .ok_or_else(|| ChatError::NotFound("chat room not found".into()))?;
        ensure_member(&room, user_id)?;
        Ok(room)
    }

    /// Room metadata as seen by `user_id`.
    pub fn room_details(&self, room: &Room, user_id: UserId) -> RoomDetails {
        RoomDetails {
            room: room.clone(),
            other_user: other_party(room, user_id),
        }
    }

    /// ACTIVE rooms of `user_id`, most recent activity first, each with its
    /// latest message and the other party.
    pub async fn list_rooms_for_user(
        &self,
        user_id: UserId,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Vec<RoomOverview>, ChatError> {
        let window = self.page_window(page, limit);
        let rooms = self
            .store
            .list_rooms_for_user(user_id, Some(window.limit), window.offset)
            .await?;

        let mut overviews = Vec::with_capacity(rooms.len());
        for room in rooms {
            let last_message = self
                .store
                .latest_message(&room.id)
                .await?
                .map(|m| surface(&room, m));
            overviews.push(RoomOverview {
                other_user: other_party(&room, user_id),
                last_message,
                room,
            });
        }
        Ok(overviews)
    }

    /// Sum of the user's own unread counters over their ACTIVE rooms.
    pub async fn total_unread(&self, user_id: UserId) -> Result<u64, ChatError> {
        let rooms = self.store.list_rooms_for_user(user_id, None, 0).await?;
        Ok(rooms
            .iter()
            .map(|room| room.unread_count.for_role(resolve_role(room, user_id)))
            .sum())
    }

    /// Archives or blocks a room. Only the owner may do this, and rooms are
    /// never reactivated.
    pub async fn set_room_status(
        &self,
        room_id: &str,
        actor_id: UserId,
        status: RoomStatus,
    ) -> Result<Room, ChatError> {
        let room = self.room_for_member(room_id, actor_id).await?;
        if room.owner_id != actor_id {
            return Err(ChatError::AccessDenied(
                "only the task owner can change the room status".into(),
            ));
        }
        if status == RoomStatus::Active {
            return Err(ChatError::Validation("rooms cannot be reactivated".into()));
        }
        if room.status == status {
            return Ok(room);
        }

        self.store.set_room_status(&room.id, status).await?;
        info!(room_id = %room.id, task_id = room.task_id, status = %status, "room status changed");
        self.store
            .get_room(&room.id)
            .await?
            .ok_or_else(|| ChatError::NotFound("chat room not found".into()))
    }
}

fn new_room(task: &TaskAssignment, user_id: UserId) -> Result<Room, ChatError> {
    let Some(bidder_id) = task.assigned_user_id else {
        if user_id != task.owner_id {
            return Err(not_a_member());
        }
        return Err(ChatError::Validation(
            "chat opens once the task has been assigned".into(),
        ));
    };
    if user_id != task.owner_id && user_id != bidder_id {
        return Err(not_a_member());
    }
    if bidder_id == task.owner_id {
        return Err(ChatError::Validation(
            "task owner and assignee are the same user".into(),
        ));
    }

    let now = timestamp_now();
    Ok(Room {
        id: new_id(),
        task_id: task.task_id,
        task_title: task.title.clone(),
        owner_id: task.owner_id,
        owner_email: task.owner_email.clone(),
        bidder_id,
        bidder_email: task.assigned_user_email.clone().unwrap_or_default(),
        status: RoomStatus::Active,
        last_message_at: now,
        last_message_by: None,
        unread_count: UnreadCount::default(),
        created_at: now,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(owner: UserId, worker: Option<UserId>) -> TaskAssignment {
        TaskAssignment {
            task_id: 42,
            title: Some("Move a couch".into()),
            owner_id: owner,
            owner_email: "owner@uni.edu".into(),
            assigned_user_id: worker,
            assigned_user_email: worker.map(|_| "worker@uni.edu".into()),
            status: Some("IN_PROGRESS".into()),
        }
    }

    #[test]
    fn room_takes_ids_from_the_task() {
        let room = new_room(&task(1, Some(2)), 2).unwrap();
        assert_eq!(room.owner_id, 1);
        assert_eq!(room.bidder_id, 2);
        assert_eq!(room.bidder_email, "worker@uni.edu");
        assert_eq!(room.status, RoomStatus::Active);
        assert_eq!(room.unread_count, UnreadCount::default());
    }

    #[test]
    fn outsiders_cannot_create_rooms() {
        let err = new_room(&task(1, Some(2)), 3).unwrap_err();
        assert_eq!(err.code(), "ACCESS_DENIED");
        let err = new_room(&task(1, None), 3).unwrap_err();
        assert_eq!(err.code(), "ACCESS_DENIED");
    }

    #[test]
    fn unassigned_or_self_assigned_tasks_are_rejected() {
        assert_eq!(
            new_room(&task(1, None), 1).unwrap_err().code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            new_room(&task(1, Some(1)), 1).unwrap_err().code(),
            "VALIDATION_ERROR"
        );
    }
}
