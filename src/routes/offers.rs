use axum::extract::{Path, State};
use axum::{Extension, Json};
use uuid::Uuid;

use crate::common::principal::Principal;
use crate::domain::offer::commands::{CreateOffer, TransitionOffer, TransitionOutcome};
use crate::domain::offer::Offer;
use crate::services::response::ServiceError;

use super::AppState;

pub async fn create(
	State(state): State<AppState>,
	Extension(principal): Extension<Principal>,
	Json(command): Json<CreateOffer>,
) -> Result<Json<Offer>, ServiceError> {
	let offer = state.offers.create(principal, command).await?;
	Ok(Json(offer))
}

pub async fn transition(
	State(state): State<AppState>,
	Extension(principal): Extension<Principal>,
	Path(offer_id): Path<Uuid>,
	Json(command): Json<TransitionOffer>,
) -> Result<Json<TransitionOutcome>, ServiceError> {
	let outcome = state.offers.transition(principal, offer_id, command.status).await?;
	Ok(Json(outcome))
}
