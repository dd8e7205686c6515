// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory task ownership provider.
//!
//! Counts lookups so tests can assert that existing rooms never go back to
//! the task service, and can simulate an outage or a slow upstream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use taskchat_core::traits::adapter::PluginAdapter;
use taskchat_core::types::{AdapterType, HealthStatus};
use taskchat_core::{ChatError, TaskAssignment, TaskId, TaskOwnershipProvider, UserId};

use crate::mock_identity::identity;

/// A task owned by `owner`, optionally assigned to `worker`.
pub fn assignment(task_id: TaskId, owner: UserId, worker: Option<UserId>) -> TaskAssignment {
    TaskAssignment {
        task_id,
        title: Some(format!("Task {task_id}")),
        owner_id: owner,
        owner_email: identity(owner).email,
        assigned_user_id: worker,
        assigned_user_email: worker.map(|w| identity(w).email),
        status: Some(if worker.is_some() { "IN_PROGRESS" } else { "OPEN" }.to_string()),
    }
}

#[derive(Default)]
pub struct StaticTaskProvider {
    tasks: RwLock<HashMap<TaskId, TaskAssignment>>,
    unavailable: AtomicBool,
    calls: AtomicUsize,
    delay: RwLock<Option<Duration>>,
}

impl StaticTaskProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(self, task: TaskAssignment) -> Self {
        self.insert(task);
        self
    }

    pub fn insert(&self, task: TaskAssignment) {
        self.tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task.task_id, task);
    }

    /// While set, every lookup fails as an upstream outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Holds every lookup for `delay`, widening race windows.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Number of lookups served so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginAdapter for StaticTaskProvider {
    fn name(&self) -> &str {
        "static-tasks"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Tasks
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Ok(HealthStatus::Unhealthy("task service down".into()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), ChatError> {
        Ok(())
    }
}

#[async_trait]
impl TaskOwnershipProvider for StaticTaskProvider {
    async fn task_assignment(&self, task_id: TaskId) -> Result<TaskAssignment, ChatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ChatError::upstream("task service unavailable"));
        }
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&task_id)
            .cloned()
            .ok_or_else(|| ChatError::NotFound(format!("task {task_id} not found")))
    }
}
