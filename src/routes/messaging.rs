use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::principal::Principal;
use crate::domain::chat::ChatMessage;
use crate::domain::room::Room;
use crate::services::handlers::EventBroker;
use crate::services::response::ServiceError;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessage {
	pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct DirectRoom {
	pub brand_id: Uuid,
	pub influencer_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
	pub count: i64,
}

pub async fn send(
	State(state): State<AppState>,
	Extension(principal): Extension<Principal>,
	Path(room_id): Path<Uuid>,
	Json(request): Json<SendMessage>,
) -> Result<Json<ChatMessage>, ServiceError> {
	let message = state.gateway.send(principal, room_id, &request.content).await?;
	Ok(Json(message))
}

pub async fn list(
	State(state): State<AppState>,
	Extension(principal): Extension<Principal>,
	Path(room_id): Path<Uuid>,
) -> Result<Json<Vec<ChatMessage>>, ServiceError> {
	Ok(Json(state.gateway.list(principal, room_id).await?))
}

pub async fn rooms(
	State(state): State<AppState>,
	Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<Room>>, ServiceError> {
	Ok(Json(state.gateway.rooms(principal).await?))
}

pub async fn mark_read(
	State(state): State<AppState>,
	Extension(principal): Extension<Principal>,
	Path(room_id): Path<Uuid>,
) -> Result<(), ServiceError> {
	state.reads.mark_room_read(principal, room_id).await
}

pub async fn unread_count(
	State(state): State<AppState>,
	Extension(principal): Extension<Principal>,
) -> Result<Json<UnreadCount>, ServiceError> {
	let count = state.reads.unread_count(principal).await?;
	Ok(Json(UnreadCount { count }))
}

/// Administrative contact channel without an offer.
pub async fn direct_room(
	State(state): State<AppState>,
	Extension(principal): Extension<Principal>,
	Json(request): Json<DirectRoom>,
) -> Result<Json<Room>, ServiceError> {
	if !principal.is_admin() {
		return Err(ServiceError::Forbidden);
	}
	let room = state.rooms.ensure_direct_room(request.brand_id, request.influencer_id).await?;
	Ok(Json(room))
}

/// Realtime refresh feed; clients still poll as the correctness backstop.
pub async fn events(
	ws: WebSocketUpgrade,
	Extension(principal): Extension<Principal>,
	State(state): State<AppState>,
) -> impl IntoResponse {
	let events = state.events.clone();
	ws.on_upgrade(move |socket| EventBroker::run_socket(socket, principal, events))
}
