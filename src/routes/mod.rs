pub mod messaging;
pub mod moderation;
pub mod offers;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::{middleware, Router};

use crate::adapters::repositories::MarketStore;
use crate::common::principal::set_principal;
use crate::domain::events::EventHub;
use crate::services::handlers::{
	BlockService, DismissalService, MessageGateway, OfferLifecycle, ReadTracker, RoomProvisioner,
};
use crate::services::notifier::Notifier;

#[derive(Clone)]
pub struct AppState {
	pub offers: OfferLifecycle,
	pub rooms: RoomProvisioner,
	pub blocks: BlockService,
	pub gateway: MessageGateway,
	pub dismissals: DismissalService,
	pub reads: ReadTracker,
	pub events: EventHub,
}

impl AppState {
	pub fn new(
		store: Arc<dyn MarketStore>,
		notifier: Arc<dyn Notifier>,
		unread_window_days: i64,
	) -> Self {
		let events = EventHub::default();
		let rooms = RoomProvisioner::new(store.clone());
		Self {
			offers: OfferLifecycle::new(store.clone(), rooms.clone(), events.clone(), notifier.clone()),
			blocks: BlockService::new(store.clone()),
			gateway: MessageGateway::new(
				store.clone(),
				BlockService::new(store.clone()),
				events.clone(),
				notifier,
			),
			dismissals: DismissalService::new(store.clone()),
			reads: ReadTracker::new(store, unread_window_days),
			rooms,
			events,
		}
	}
}

pub fn create_routes(state: AppState) -> Router {
	Router::new()
		.route("/offers", post(offers::create))
		.route("/offers/:id/transition", post(offers::transition))
		.route("/rooms", get(messaging::rooms))
		.route("/rooms/direct", post(messaging::direct_room))
		.route("/rooms/:id/messages", post(messaging::send).get(messaging::list))
		.route("/rooms/:id/read", post(messaging::mark_read))
		.route("/unread-count", get(messaging::unread_count))
		.route("/messages/:id", delete(moderation::delete_message))
		.route(
			"/blocks/:user_id",
			post(moderation::block).delete(moderation::unblock).get(moderation::block_status),
		)
		.route("/dismissals", post(moderation::dismiss))
		.route("/dismissals/:kind", get(moderation::list_dismissed))
		.route("/dismissals/:kind/:target_id", delete(moderation::undismiss))
		.route("/events", get(messaging::events))
		.layer(middleware::from_fn(set_principal))
		.with_state(state)
}

#[cfg(test)]
mod test {
	use std::sync::Arc;

	use axum::body::Body;
	use axum::http::{Request, StatusCode};
	use tower::ServiceExt;
	use uuid::Uuid;

	use crate::adapters::repositories::memory::InMemoryStore;
	use crate::services::notifier::LogNotifier;

	use super::{create_routes, AppState};

	fn app() -> axum::Router {
		let state = AppState::new(Arc::new(InMemoryStore::new()), Arc::new(LogNotifier), 7);
		create_routes(state)
	}

	#[tokio::test]
	async fn requests_without_principal_headers_are_rejected() {
		let response = app()
			.oneshot(Request::builder().uri("/unread-count").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
	}

	#[tokio::test]
	async fn offer_round_trip_over_http() {
		let app = app();
		let brand_id = Uuid::new_v4();
		let influencer_id = Uuid::new_v4();

		let body = serde_json::json!({
			"receiver_user_id": influencer_id,
			"campaign_name": "Summer Launch",
			"campaign_type": "story",
			"budget": "5000",
			"payment_type": "cash",
			"message": "Interested?",
		});
		let response = app
			.oneshot(
				Request::builder()
					.method("POST")
					.uri("/offers")
					.header("content-type", "application/json")
					.header("x-user-id", brand_id.to_string())
					.header("x-user-role", "brand")
					.body(Body::from(serde_json::to_vec(&body).unwrap()))
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
	}

	#[tokio::test]
	async fn unread_count_defaults_to_zero() {
		let response = app()
			.oneshot(
				Request::builder()
					.uri("/unread-count")
					.header("x-user-id", Uuid::new_v4().to_string())
					.header("x-user-role", "influencer")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
	}
}
