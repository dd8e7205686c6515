// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST handlers under `/api/chat` plus the public health endpoint.
//!
//! Responses are `{"success": true, "data": ...}`; failures are
//! `{"success": false, "error": {"code", "message"}}` with a status derived
//! from the error kind.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use taskchat_core::{
    ChatError, HealthStatus, Identity, Message, RoomDetails, RoomOverview, RoomStatus, TaskId,
};

use crate::server::GatewayState;

/// A [`ChatError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ChatError);

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ChatError::Auth(_) => StatusCode::UNAUTHORIZED,
            ChatError::AccessDenied(_) => StatusCode::FORBIDDEN,
            ChatError::Validation(_) => StatusCode::BAD_REQUEST,
            ChatError::NotFound(_) => StatusCode::NOT_FOUND,
            ChatError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ChatError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            ChatError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = ErrorBody {
            success: false,
            error: ErrorDetail {
                code: self.0.code(),
                message: self.0.public_message(),
            },
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse {
        success: true,
        data,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RoomWithMessages {
    pub room: RoomDetails,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct RoomList {
    pub rooms: Vec<RoomOverview>,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Serialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    pub message_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountBody {
    pub unread_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalUnreadBody {
    pub total_unread: u64,
}

#[derive(Debug, Deserialize)]
pub struct EditMessageRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RoomStatusRequest {
    pub status: RoomStatus,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub connected_users: usize,
    pub active_rooms: usize,
    pub store: String,
}

/// POST /api/chat/rooms/task/{task_id}
pub async fn open_task_room(
    State(state): State<GatewayState>,
    Extension(user): Extension<Identity>,
    Path(task_id): Path<TaskId>,
) -> ApiResult<RoomWithMessages> {
    let room = state.engine.get_or_create_room(task_id, user.user_id).await?;
    let messages = state.engine.backlog(&room).await?;
    ok(RoomWithMessages {
        room: state.engine.room_details(&room, user.user_id),
        messages,
    })
}

/// GET /api/chat/rooms/task/{task_id}
pub async fn get_task_room(
    State(state): State<GatewayState>,
    Extension(user): Extension<Identity>,
    Path(task_id): Path<TaskId>,
) -> ApiResult<RoomWithMessages> {
    let room = state.engine.get_room_by_task(task_id, user.user_id).await?;
    let messages = state.engine.backlog(&room).await?;
    ok(RoomWithMessages {
        room: state.engine.room_details(&room, user.user_id),
        messages,
    })
}

/// GET /api/chat/rooms
pub async fn list_rooms(
    State(state): State<GatewayState>,
    Extension(user): Extension<Identity>,
    Query(query): Query<PageQuery>,
) -> ApiResult<RoomList> {
    let window = state.engine.page_window(query.page, query.limit);
    let rooms = state
        .engine
        .list_rooms_for_user(user.user_id, query.page, query.limit)
        .await?;
    ok(RoomList {
        rooms,
        page: query.page.unwrap_or(1).max(1),
        limit: window.limit,
    })
}

/// GET /api/chat/rooms/{room_id}/messages
///
/// Pages count back from the newest message; each page is returned in
/// chronological order.
pub async fn list_messages(
    State(state): State<GatewayState>,
    Extension(user): Extension<Identity>,
    Path(room_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<MessagePage> {
    let room = state.engine.room_for_member(&room_id, user.user_id).await?;
    let window = state.engine.page_window(query.page, query.limit);
    let mut messages = state
        .engine
        .list_messages(&room.id, window.limit, window.offset)
        .await?;
    messages.reverse();
    ok(MessagePage {
        messages,
        page: query.page.unwrap_or(1).max(1),
        limit: window.limit,
    })
}

/// POST /api/chat/rooms/{room_id}/messages/read
pub async fn mark_read(
    State(state): State<GatewayState>,
    Extension(user): Extension<Identity>,
    Path(room_id): Path<String>,
    Json(body): Json<MarkReadRequest>,
) -> ApiResult<UnreadCountBody> {
    let unread_count = state
        .engine
        .mark_read(&room_id, &body.message_ids, user.user_id)
        .await?;
    ok(UnreadCountBody { unread_count })
}

/// GET /api/chat/unread-count
pub async fn unread_count(
    State(state): State<GatewayState>,
    Extension(user): Extension<Identity>,
) -> ApiResult<TotalUnreadBody> {
    let total_unread = state.engine.total_unread(user.user_id).await?;
    ok(TotalUnreadBody { total_unread })
}

/// PATCH /api/chat/messages/{message_id}
pub async fn edit_message(
    State(state): State<GatewayState>,
    Extension(user): Extension<Identity>,
    Path(message_id): Path<String>,
    Json(body): Json<EditMessageRequest>,
) -> ApiResult<Message> {
    let message = state
        .engine
        .edit_message(&message_id, user.user_id, &body.message)
        .await?;
    ok(message)
}

/// DELETE /api/chat/messages/{message_id}
pub async fn delete_message(
    State(state): State<GatewayState>,
    Extension(user): Extension<Identity>,
    Path(message_id): Path<String>,
) -> ApiResult<Deleted> {
    state.engine.delete_message(&message_id, user.user_id).await?;
    ok(Deleted { id: message_id })
}

/// POST /api/chat/rooms/{room_id}/status
pub async fn set_room_status(
    State(state): State<GatewayState>,
    Extension(user): Extension<Identity>,
    Path(room_id): Path<String>,
    Json(body): Json<RoomStatusRequest>,
) -> ApiResult<RoomDetails> {
    let room = state
        .engine
        .set_room_status(&room_id, user.user_id, body.status)
        .await?;
    ok(state.engine.room_details(&room, user.user_id))
}

/// GET /health (public)
pub async fn health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let store = match state.engine.store().health_check().await {
        Ok(HealthStatus::Healthy) => "healthy".to_string(),
        Ok(HealthStatus::Degraded(reason)) => format!("degraded: {reason}"),
        Ok(HealthStatus::Unhealthy(reason)) => format!("unhealthy: {reason}"),
        Err(e) => format!("unhealthy: {}", e.public_message()),
    };
    let status = if store == "healthy" { "ok" } else { "degraded" };
    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        connected_users: state.sessions.connected_user_count(),
        active_rooms: state.sessions.active_room_count(),
        store,
    })
}
