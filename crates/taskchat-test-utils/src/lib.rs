// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Taskchat integration tests.
//!
//! Provides mock adapters and a harness that runs the real gateway on an
//! ephemeral port over a temp SQLite database, so tests need no external
//! services.
//!
//! # Components
//!
//! - [`StaticIdentityGateway`] - token table standing in for the identity service
//! - [`StaticTaskProvider`] - in-memory task assignments with failure injection
//! - [`TestHarness`] - full gateway stack plus client helpers

pub mod harness;
pub mod mock_identity;
pub mod mock_tasks;

pub use harness::{EventLog, TestHarness, temp_store};
pub use mock_identity::{StaticIdentityGateway, identity, token_for};
pub use mock_tasks::{StaticTaskProvider, assignment};
