// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Room and message engine for Taskchat.
//!
//! [`ChatEngine`] owns the room lifecycle (lazy creation, membership,
//! archive/block) and the message invariants (length limits, role
//! resolution, unread accounting). It talks to the outside world only
//! through the [`ChatStore`] and [`TaskOwnershipProvider`] traits and is
//! shared by the realtime gateway and the REST surface.

pub mod messages;
pub mod role;
pub mod rooms;

use std::sync::Arc;

use taskchat_config::model::ChatConfig;
use taskchat_core::{ChatError, ChatStore, TaskOwnershipProvider};

pub use role::{other_party, resolve_role, sender_name};

/// Page size and offset for a 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: u32,
    pub offset: u32,
}

/// Resolves a 1-based `page` and requested `limit` into a bounded window.
pub fn page_window(limits: &ChatConfig, page: Option<u32>, limit: Option<u32>) -> PageWindow {
    let limit = limit
        .unwrap_or(limits.default_page_size)
        .clamp(1, limits.max_page_size.max(1));
    let page = page.unwrap_or(1).max(1);
    PageWindow {
        limit,
        offset: (page - 1).saturating_mul(limit),
    }
}

/// Trims `text` and checks it against `max_chars` (counted in characters).
pub fn validate_text(text: &str, max_chars: usize) -> Result<String, ChatError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ChatError::Validation("message cannot be empty".into()));
    }
    if trimmed.chars().count() > max_chars {
        return Err(ChatError::Validation(format!(
            "message exceeds {max_chars} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// The room/message engine.
///
/// Holds no per-connection state; share it behind an `Arc`.
pub struct ChatEngine {
    store: Arc<dyn ChatStore>,
    tasks: Arc<dyn TaskOwnershipProvider>,
    limits: ChatConfig,
}

impl ChatEngine {
    pub fn new(
        store: Arc<dyn ChatStore>,
        tasks: Arc<dyn TaskOwnershipProvider>,
        limits: ChatConfig,
    ) -> Self {
        Self {
            store,
            tasks,
            limits,
        }
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    pub fn limits(&self) -> &ChatConfig {
        &self.limits
    }

    pub fn page_window(&self, page: Option<u32>, limit: Option<u32>) -> PageWindow {
        page_window(&self.limits, page, limit)
    }
}
