// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime gateway for Taskchat.
//!
//! Serves the WebSocket endpoint backed by the [`SessionManager`], the
//! bearer-protected, per-user rate limited REST routes under `/api/chat`, and a public `/health`.
//! The presence reaper runs beside the server and shares its shutdown
//! token.

pub mod auth;
pub mod handlers;
pub mod hub;
pub mod limit;
pub mod presence;
pub mod server;
pub mod session;
pub mod ws;

pub use hub::RoomHub;
pub use server::{GatewayState, bind, router, serve, start_server};
pub use session::SessionManager;
