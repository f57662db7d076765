use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::common::principal::Principal;
use crate::domain::block::BlockStatus;
use crate::domain::dismissal::DismissKind;
use crate::services::response::ServiceError;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct Dismiss {
	pub kind: DismissKind,
	pub target_id: Uuid,
}

pub async fn block(
	State(state): State<AppState>,
	Extension(principal): Extension<Principal>,
	Path(user_id): Path<Uuid>,
) -> Result<(), ServiceError> {
	state.blocks.block(principal, user_id).await
}

pub async fn unblock(
	State(state): State<AppState>,
	Extension(principal): Extension<Principal>,
	Path(user_id): Path<Uuid>,
) -> Result<(), ServiceError> {
	state.blocks.unblock(principal, user_id).await
}

pub async fn block_status(
	State(state): State<AppState>,
	Extension(principal): Extension<Principal>,
	Path(user_id): Path<Uuid>,
) -> Result<Json<BlockStatus>, ServiceError> {
	Ok(Json(state.blocks.status(principal, user_id).await?))
}

pub async fn dismiss(
	State(state): State<AppState>,
	Extension(principal): Extension<Principal>,
	Json(request): Json<Dismiss>,
) -> Result<(), ServiceError> {
	state.dismissals.dismiss(principal, request.kind, request.target_id).await
}

pub async fn undismiss(
	State(state): State<AppState>,
	Extension(principal): Extension<Principal>,
	Path((kind, target_id)): Path<(DismissKind, Uuid)>,
) -> Result<(), ServiceError> {
	state.dismissals.undismiss(principal, kind, target_id).await
}

pub async fn list_dismissed(
	State(state): State<AppState>,
	Extension(principal): Extension<Principal>,
	Path(kind): Path<DismissKind>,
) -> Result<Json<Vec<Uuid>>, ServiceError> {
	Ok(Json(state.dismissals.list(principal, kind).await?))
}

/// Moderation override: any message, any room, admin only.
pub async fn delete_message(
	State(state): State<AppState>,
	Extension(principal): Extension<Principal>,
	Path(message_id): Path<Uuid>,
) -> Result<(), ServiceError> {
	state.gateway.delete(principal, message_id).await
}
