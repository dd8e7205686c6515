// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod identity;
pub mod storage;
pub mod tasks;

pub use adapter::PluginAdapter;
pub use identity::IdentityGateway;
pub use storage::ChatStore;
pub use tasks::TaskOwnershipProvider;
