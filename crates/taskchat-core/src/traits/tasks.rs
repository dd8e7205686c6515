// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Task ownership lookups against the task service.

use async_trait::async_trait;

use crate::error::ChatError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{TaskAssignment, TaskId};

#[async_trait]
pub trait TaskOwnershipProvider: PluginAdapter {
    /// Fetches the owner and assigned worker of a task.
    ///
    /// Unknown tasks yield [`ChatError::NotFound`]; an unreachable or
    /// misbehaving service yields [`ChatError::UpstreamUnavailable`].
    async fn task_assignment(&self, task_id: TaskId) -> Result<TaskAssignment, ChatError>;
}
