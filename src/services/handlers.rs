use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use chrono::{Duration, Utc};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::adapters::repositories::{MarketStore, StoreError};
use crate::common::principal::Principal;
use crate::domain::block::BlockStatus;
use crate::domain::chat::ChatMessage;
use crate::domain::dismissal::{DismissKind, Dismissal};
use crate::domain::events::{DomainEvent, EventHub};
use crate::domain::offer::commands::{CreateOffer, TransitionOutcome};
use crate::domain::offer::{Offer, OfferStatus};
use crate::domain::room::Room;

use super::notifier::{dispatch, NotificationCategory, Notifier};
use super::response::ServiceError;

/// Find-or-create for rooms. One room per offer, one offer-less room per
/// unordered participant pair; the store's unique keys are the authority
/// and a lost insert race resolves to the winner's row.
#[derive(Clone)]
pub struct RoomProvisioner {
	store: Arc<dyn MarketStore>,
}

impl RoomProvisioner {
	pub fn new(store: Arc<dyn MarketStore>) -> Self {
		Self { store }
	}

	pub async fn ensure_room_for_offer(&self, offer: &Offer) -> Result<Room, ServiceError> {
		if let Some(room) = self.store.find_room_by_offer(offer.id).await? {
			return Ok(room);
		}
		let room = Room {
			id: Uuid::new_v4(),
			offer_id: Some(offer.id),
			brand_id: offer.sender_user_id,
			influencer_id: offer.receiver_user_id,
			last_message_at: None,
		};
		match self.store.insert_room(&room).await {
			Ok(()) => Ok(room),
			Err(StoreError::UniqueViolation) => {
				// A concurrent caller inserted first; hand back its row.
				self.store
					.find_room_by_offer(offer.id)
					.await?
					.ok_or(ServiceError::NotFound)
			}
			Err(err) => Err(err.into()),
		}
	}

	/// Offer-less channel for administrative contact (welcome messages,
	/// support). Privilege is checked by the caller.
	pub async fn ensure_direct_room(
		&self,
		brand_id: Uuid,
		influencer_id: Uuid,
	) -> Result<Room, ServiceError> {
		if let Some(room) = self.store.find_room_by_pair(brand_id, influencer_id).await? {
			return Ok(room);
		}
		let room = Room {
			id: Uuid::new_v4(),
			offer_id: None,
			brand_id,
			influencer_id,
			last_message_at: None,
		};
		match self.store.insert_room(&room).await {
			Ok(()) => Ok(room),
			Err(StoreError::UniqueViolation) => self
				.store
				.find_room_by_pair(brand_id, influencer_id)
				.await?
				.ok_or(ServiceError::NotFound),
			Err(err) => Err(err.into()),
		}
	}
}

/// Offer state machine. Only the receiver moves an offer, only away from
/// `pending`, and only once; the store's conditional update decides the
/// winner under concurrency.
#[derive(Clone)]
pub struct OfferLifecycle {
	store: Arc<dyn MarketStore>,
	rooms: RoomProvisioner,
	events: EventHub,
	notifier: Arc<dyn Notifier>,
}

impl OfferLifecycle {
	pub fn new(
		store: Arc<dyn MarketStore>,
		rooms: RoomProvisioner,
		events: EventHub,
		notifier: Arc<dyn Notifier>,
	) -> Self {
		Self {
			store,
			rooms,
			events,
			notifier,
		}
	}

	pub async fn create(&self, principal: Principal, command: CreateOffer) -> Result<Offer, ServiceError> {
		if !principal.is_brand() {
			return Err(ServiceError::Forbidden);
		}
		if principal.user_id == command.receiver_user_id {
			return Err(ServiceError::InvalidArgument(
				"an offer cannot target its own sender".into(),
			));
		}
		if command.campaign_name.trim().is_empty() {
			return Err(ServiceError::InvalidArgument("campaign name cannot be empty".into()));
		}

		let offer = Offer {
			id: Uuid::new_v4(),
			sender_user_id: principal.user_id,
			receiver_user_id: command.receiver_user_id,
			campaign_name: command.campaign_name,
			campaign_type: command.campaign_type,
			budget: command.budget,
			payment_type: command.payment_type,
			message: command.message,
			status: OfferStatus::Pending,
			created_at: Utc::now(),
		};
		self.store.insert_offer(&offer).await?;

		self.events.publish(DomainEvent::OfferCreated {
			offer_id: offer.id,
			sender_user_id: offer.sender_user_id,
			receiver_user_id: offer.receiver_user_id,
		});
		dispatch(
			self.notifier.clone(),
			offer.receiver_user_id,
			"New offer",
			format!("You received a new offer for \"{}\".", offer.campaign_name),
			NotificationCategory::Offer,
		);
		Ok(offer)
	}

	pub async fn transition(
		&self,
		principal: Principal,
		offer_id: Uuid,
		target: OfferStatus,
	) -> Result<TransitionOutcome, ServiceError> {
		if target.is_pending() {
			return Err(ServiceError::InvalidArgument(
				"pending is not a valid transition target".into(),
			));
		}

		let offer = self.store.get_offer(offer_id).await?.ok_or(ServiceError::NotFound)?;
		if offer.receiver_user_id != principal.user_id {
			return Err(ServiceError::Forbidden);
		}
		if !offer.status.is_pending() {
			return self.settled_outcome(&offer, target).await;
		}

		let won = self
			.store
			.transition_offer(offer_id, OfferStatus::Pending, target)
			.await?;
		if !won {
			// Lost a race since the read above; the row carries the
			// winner's decision now.
			return match self.store.get_offer(offer_id).await? {
				None => Err(ServiceError::NotFound),
				Some(current) => self.settled_outcome(&current, target).await,
			};
		}

		let room_id = if target.provisions_room() {
			Some(self.rooms.ensure_room_for_offer(&offer).await?.id)
		} else {
			None
		};

		self.events.publish(DomainEvent::OfferTransitioned {
			offer_id,
			sender_user_id: offer.sender_user_id,
			receiver_user_id: offer.receiver_user_id,
			status: target,
			room_id,
		});
		dispatch(
			self.notifier.clone(),
			offer.sender_user_id,
			"Offer update",
			format!("Your offer \"{}\" is now {}.", offer.campaign_name, target),
			NotificationCategory::Offer,
		);
		Ok(TransitionOutcome { status: target, room_id })
	}

	/// Path for an offer that already left `pending`. A retry asking for
	/// the status the offer settled on gets the existing outcome back,
	/// running the provisioner again in case an earlier attempt died
	/// between the status update and the room insert. Any other target is
	/// a conflict the client must observe.
	async fn settled_outcome(
		&self,
		offer: &Offer,
		target: OfferStatus,
	) -> Result<TransitionOutcome, ServiceError> {
		if offer.status != target {
			return Err(ServiceError::InvalidState);
		}
		let room_id = if target.provisions_room() {
			Some(self.rooms.ensure_room_for_offer(offer).await?.id)
		} else {
			None
		};
		Ok(TransitionOutcome { status: target, room_id })
	}
}

/// Directed block relation. Blocking is idempotent; block state is read
/// fresh by the gateway on every send.
#[derive(Clone)]
pub struct BlockService {
	store: Arc<dyn MarketStore>,
}

impl BlockService {
	pub fn new(store: Arc<dyn MarketStore>) -> Self {
		Self { store }
	}

	pub async fn block(&self, principal: Principal, blocked_user_id: Uuid) -> Result<(), ServiceError> {
		if principal.user_id == blocked_user_id {
			return Err(ServiceError::InvalidArgument("you cannot block yourself".into()));
		}
		self.store.upsert_block(principal.user_id, blocked_user_id).await?;
		Ok(())
	}

	pub async fn unblock(&self, principal: Principal, blocked_user_id: Uuid) -> Result<(), ServiceError> {
		// Removing an absent block is still success.
		self.store.delete_block(principal.user_id, blocked_user_id).await?;
		Ok(())
	}

	pub async fn status(&self, principal: Principal, other: Uuid) -> Result<BlockStatus, ServiceError> {
		self.status_between(principal.user_id, other).await
	}

	pub async fn status_between(&self, a: Uuid, b: Uuid) -> Result<BlockStatus, ServiceError> {
		Ok(BlockStatus {
			has_blocked: self.store.block_exists(a, b).await?,
			blocked_by: self.store.block_exists(b, a).await?,
		})
	}
}

/// Validates and persists chat messages, gated by block state, and kicks
/// off the decoupled side effects (activity touch, notification, event).
#[derive(Clone)]
pub struct MessageGateway {
	store: Arc<dyn MarketStore>,
	blocks: BlockService,
	events: EventHub,
	notifier: Arc<dyn Notifier>,
}

impl MessageGateway {
	pub fn new(
		store: Arc<dyn MarketStore>,
		blocks: BlockService,
		events: EventHub,
		notifier: Arc<dyn Notifier>,
	) -> Self {
		Self {
			store,
			blocks,
			events,
			notifier,
		}
	}

	pub async fn send(
		&self,
		principal: Principal,
		room_id: Uuid,
		content: &str,
	) -> Result<ChatMessage, ServiceError> {
		let content = content.trim();
		if content.is_empty() {
			return Err(ServiceError::InvalidArgument("message content cannot be empty".into()));
		}

		let room = self.store.get_room(room_id).await?.ok_or(ServiceError::NotFound)?;
		let recipient = room
			.other_participant(principal.user_id)
			.ok_or(ServiceError::Forbidden)?;

		// Not cached: block state can change between two messages of the
		// same session. Either direction forbids the send.
		let blocks = self.blocks.status_between(principal.user_id, recipient).await?;
		if blocks.any() {
			return Err(ServiceError::Blocked);
		}

		let message = ChatMessage {
			id: Uuid::new_v4(),
			room_id,
			sender_id: principal.user_id,
			content: content.to_owned(),
			created_at: Utc::now(),
		};
		self.store.insert_message(&message).await?;

		// The send is already durable; a stale activity timestamp is not
		// worth failing it over.
		if let Err(err) = self.store.touch_room_activity(room_id, message.created_at).await {
			tracing::warn!(%room_id, "failed to update room activity: {}", err);
		}

		self.events.publish(DomainEvent::MessageSent {
			message_id: message.id,
			room_id,
			sender_id: principal.user_id,
			recipient_id: recipient,
		});
		dispatch(
			self.notifier.clone(),
			recipient,
			"New message",
			"You have a new message.",
			NotificationCategory::Message,
		);
		Ok(message)
	}

	/// The caller's conversation list, most recently active first.
	pub async fn rooms(&self, principal: Principal) -> Result<Vec<Room>, ServiceError> {
		Ok(self.store.rooms_for_user(principal.user_id).await?)
	}

	pub async fn list(&self, principal: Principal, room_id: Uuid) -> Result<Vec<ChatMessage>, ServiceError> {
		let room = self.store.get_room(room_id).await?.ok_or(ServiceError::NotFound)?;
		if !room.is_participant(principal.user_id) {
			return Err(ServiceError::Forbidden);
		}
		Ok(self.store.list_room_messages(room_id).await?)
	}

	/// Privileged override, not an extension of the participant contract:
	/// moderation may remove any message by id.
	pub async fn delete(&self, principal: Principal, message_id: Uuid) -> Result<(), ServiceError> {
		if !principal.is_admin() {
			return Err(ServiceError::Forbidden);
		}
		if !self.store.delete_message(message_id).await? {
			return Err(ServiceError::NotFound);
		}
		Ok(())
	}
}

/// Reversible hide markers, two namespaces (offers, counterpart users).
/// Re-dismissing is success, so all three operations retry safely.
#[derive(Clone)]
pub struct DismissalService {
	store: Arc<dyn MarketStore>,
}

impl DismissalService {
	pub fn new(store: Arc<dyn MarketStore>) -> Self {
		Self { store }
	}

	pub async fn dismiss(
		&self,
		principal: Principal,
		kind: DismissKind,
		target_id: Uuid,
	) -> Result<(), ServiceError> {
		if kind == DismissKind::Offer {
			let offer = self.store.get_offer(target_id).await?.ok_or(ServiceError::NotFound)?;
			if offer.receiver_user_id != principal.user_id {
				return Err(ServiceError::Forbidden);
			}
		}
		let dismissal = Dismissal {
			user_id: principal.user_id,
			kind,
			target_id,
		};
		match self.store.insert_dismissal(&dismissal).await {
			Ok(()) => Ok(()),
			// Already hidden, possibly by a concurrent retry.
			Err(StoreError::UniqueViolation) => Ok(()),
			Err(err) => Err(err.into()),
		}
	}

	pub async fn undismiss(
		&self,
		principal: Principal,
		kind: DismissKind,
		target_id: Uuid,
	) -> Result<(), ServiceError> {
		self.store.delete_dismissal(principal.user_id, kind, target_id).await?;
		Ok(())
	}

	pub async fn list(&self, principal: Principal, kind: DismissKind) -> Result<Vec<Uuid>, ServiceError> {
		Ok(self.store.list_dismissed(principal.user_id, kind).await?)
	}
}

/// Read receipts and the derived unread counter. The `message_reads` join
/// table is the single source of truth; there is no session-side shadow of
/// "last read".
#[derive(Clone)]
pub struct ReadTracker {
	store: Arc<dyn MarketStore>,
	window_days: i64,
}

impl ReadTracker {
	pub fn new(store: Arc<dyn MarketStore>, window_days: i64) -> Self {
		Self { store, window_days }
	}

	/// Upserts one receipt per foreign message in the room. Safe to retry.
	pub async fn mark_room_read(&self, principal: Principal, room_id: Uuid) -> Result<(), ServiceError> {
		let room = self.store.get_room(room_id).await?.ok_or(ServiceError::NotFound)?;
		if !room.is_participant(principal.user_id) {
			return Err(ServiceError::Forbidden);
		}
		let ids = self.store.foreign_message_ids(room_id, principal.user_id).await?;
		if ids.is_empty() {
			return Ok(());
		}
		self.store.upsert_read_receipts(principal.user_id, &ids).await?;
		Ok(())
	}

	/// Count of foreign messages without a receipt across the caller's
	/// rooms, bounded to the configured recency window. Messages older
	/// than the window are not counted even if never read; the bound is a
	/// deliberate query-cost trade-off.
	pub async fn unread_count(&self, principal: Principal) -> Result<i64, ServiceError> {
		let since = Utc::now() - Duration::days(self.window_days);
		Ok(self.store.count_unread(principal.user_id, since).await?)
	}
}

/// Forwards domain events concerning the connected user over a websocket.
/// Pure refresh signal: a dropped frame only delays the client's next poll.
pub struct EventBroker;

impl EventBroker {
	pub async fn run_socket(stream: WebSocket, principal: Principal, events: EventHub) {
		let (mut sender, mut receiver) = stream.split();
		let mut subscription = events.subscribe();

		let mut send_task = tokio::spawn(async move {
			loop {
				match subscription.recv().await {
					Ok(event) => {
						if !event.participants().contains(&principal.user_id) {
							continue;
						}
						let Ok(frame) = serde_json::to_string(&event) else {
							continue;
						};
						if sender.send(Message::Text(frame)).await.is_err() {
							break;
						}
					}
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						tracing::debug!(skipped, "event subscriber lagged");
					}
					Err(broadcast::error::RecvError::Closed) => break,
				}
			}
		});

		// Mutations go through HTTP; inbound frames only signal liveness.
		let mut recv_task = tokio::spawn(async move {
			while let Some(Ok(message)) = receiver.next().await {
				if let Message::Close(_) = message {
					break;
				}
			}
		});

		tokio::select! {
			_ = (&mut send_task) => recv_task.abort(),
			_ = (&mut recv_task) => send_task.abort(),
		};
	}
}

#[cfg(test)]
mod test {
	use std::sync::atomic::{AtomicBool, Ordering};
	use std::sync::Arc;

	use async_trait::async_trait;
	use chrono::{DateTime, Duration, Utc};
	use rust_decimal::Decimal;
	use uuid::Uuid;

	use crate::adapters::repositories::memory::InMemoryStore;
	use crate::adapters::repositories::{MarketStore, StoreError};
	use crate::common::principal::{Principal, Role};
	use crate::domain::chat::ChatMessage;
	use crate::domain::dismissal::{DismissKind, Dismissal};
	use crate::domain::events::{DomainEvent, EventHub};
	use crate::domain::offer::commands::CreateOffer;
	use crate::domain::offer::{Offer, OfferStatus, PaymentType};
	use crate::domain::room::Room;
	use crate::services::notifier::LogNotifier;
	use crate::services::response::ServiceError;

	use super::*;

	struct Fixture {
		store: Arc<InMemoryStore>,
		events: EventHub,
		offers: OfferLifecycle,
		rooms: RoomProvisioner,
		blocks: BlockService,
		gateway: MessageGateway,
		dismissals: DismissalService,
		reads: ReadTracker,
	}

	fn brand() -> Principal {
		Principal {
			user_id: Uuid::new_v4(),
			role: Role::Brand,
		}
	}

	fn influencer() -> Principal {
		Principal {
			user_id: Uuid::new_v4(),
			role: Role::Influencer,
		}
	}

	fn admin() -> Principal {
		Principal {
			user_id: Uuid::new_v4(),
			role: Role::Admin,
		}
	}

	fn offer_to(receiver: Uuid) -> CreateOffer {
		CreateOffer {
			receiver_user_id: receiver,
			campaign_name: "Summer Launch".into(),
			campaign_type: "story".into(),
			budget: Some(Decimal::from(5000)),
			payment_type: PaymentType::Cash,
			message: "Interested?".into(),
		}
	}

	#[tokio::test]
	async fn accept_transitions_once_and_provisions_room() {
		let fx = fixture();
		let (b1, i1) = (brand(), influencer());

		let offer = fx.offers.create(b1, offer_to(i1.user_id)).await.unwrap();
		assert_eq!(offer.status, OfferStatus::Pending);

		let outcome = fx.offers.transition(i1, offer.id, OfferStatus::Accepted).await.unwrap();
		assert_eq!(outcome.status, OfferStatus::Accepted);
		let room_id = outcome.room_id.expect("accept must provision a room");

		// Retrying the same decision hands back the same outcome.
		let again = fx.offers.transition(i1, offer.id, OfferStatus::Accepted).await.unwrap();
		assert_eq!(again.room_id, Some(room_id));
		// A different decision is a real conflict.
		let rejected = fx.offers.transition(i1, offer.id, OfferStatus::Rejected).await;
		assert_eq!(rejected.unwrap_err(), ServiceError::InvalidState);

		// Provisioning stays keyed to the offer.
		let stored = fx.store.get_offer(offer.id).await.unwrap().unwrap();
		let room = fx.rooms.ensure_room_for_offer(&stored).await.unwrap();
		assert_eq!(room.id, room_id);
	}

	#[tokio::test]
	async fn reject_provisions_nothing() {
		let fx = fixture();
		let (b1, i1) = (brand(), influencer());
		let offer = fx.offers.create(b1, offer_to(i1.user_id)).await.unwrap();

		let outcome = fx.offers.transition(i1, offer.id, OfferStatus::Rejected).await.unwrap();
		assert_eq!(outcome.status, OfferStatus::Rejected);
		assert!(outcome.room_id.is_none());
		assert!(fx.store.find_room_by_offer(offer.id).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn hold_is_persisted_and_provisions_room() {
		let fx = fixture();
		let (b1, i1) = (brand(), influencer());
		let offer = fx.offers.create(b1, offer_to(i1.user_id)).await.unwrap();

		let outcome = fx.offers.transition(i1, offer.id, OfferStatus::Hold).await.unwrap();
		assert!(outcome.room_id.is_some());

		let stored = fx.store.get_offer(offer.id).await.unwrap().unwrap();
		assert_eq!(stored.status, OfferStatus::Hold);

		// Hold freezes the machine like the terminal states do.
		let late = fx.offers.transition(i1, offer.id, OfferStatus::Accepted).await;
		assert_eq!(late.unwrap_err(), ServiceError::InvalidState);
	}

	#[tokio::test]
	async fn transition_guards() {
		let fx = fixture();
		let (b1, i1) = (brand(), influencer());
		let offer = fx.offers.create(b1, offer_to(i1.user_id)).await.unwrap();

		let stranger = influencer();
		let err = fx.offers.transition(stranger, offer.id, OfferStatus::Accepted).await;
		assert_eq!(err.unwrap_err(), ServiceError::Forbidden);

		let missing = fx.offers.transition(i1, Uuid::new_v4(), OfferStatus::Accepted).await;
		assert_eq!(missing.unwrap_err(), ServiceError::NotFound);

		let to_pending = fx.offers.transition(i1, offer.id, OfferStatus::Pending).await;
		assert!(matches!(to_pending.unwrap_err(), ServiceError::InvalidArgument(_)));
	}

	#[tokio::test]
	async fn only_brands_create_offers() {
		let fx = fixture();
		let i1 = influencer();
		let err = fx.offers.create(i1, offer_to(Uuid::new_v4())).await;
		assert_eq!(err.unwrap_err(), ServiceError::Forbidden);
	}

	/// Delegating store that simulates stale reads: the room lookup can
	/// miss once, and offers can read back as still pending. Both force
	/// callers into the insert and conditional-update race paths.
	struct ForgetfulStore {
		inner: InMemoryStore,
		forget_next_find: AtomicBool,
		stale_pending: AtomicBool,
	}

	#[async_trait]
	impl MarketStore for ForgetfulStore {
		async fn insert_offer(&self, offer: &Offer) -> Result<(), StoreError> {
			self.inner.insert_offer(offer).await
		}
		async fn get_offer(&self, id: Uuid) -> Result<Option<Offer>, StoreError> {
			let offer = self.inner.get_offer(id).await?;
			if self.stale_pending.load(Ordering::SeqCst) {
				return Ok(offer.map(|o| Offer {
					status: OfferStatus::Pending,
					..o
				}));
			}
			Ok(offer)
		}
		async fn transition_offer(
			&self,
			id: Uuid,
			from: OfferStatus,
			to: OfferStatus,
		) -> Result<bool, StoreError> {
			self.inner.transition_offer(id, from, to).await
		}
		async fn insert_room(&self, room: &Room) -> Result<(), StoreError> {
			self.inner.insert_room(room).await
		}
		async fn get_room(&self, id: Uuid) -> Result<Option<Room>, StoreError> {
			self.inner.get_room(id).await
		}
		async fn find_room_by_offer(&self, offer_id: Uuid) -> Result<Option<Room>, StoreError> {
			if self.forget_next_find.swap(false, Ordering::SeqCst) {
				return Ok(None);
			}
			self.inner.find_room_by_offer(offer_id).await
		}
		async fn find_room_by_pair(&self, a: Uuid, b: Uuid) -> Result<Option<Room>, StoreError> {
			self.inner.find_room_by_pair(a, b).await
		}
		async fn rooms_for_user(&self, user_id: Uuid) -> Result<Vec<Room>, StoreError> {
			self.inner.rooms_for_user(user_id).await
		}
		async fn touch_room_activity(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
			self.inner.touch_room_activity(id, at).await
		}
		async fn insert_message(&self, message: &ChatMessage) -> Result<(), StoreError> {
			self.inner.insert_message(message).await
		}
		async fn get_message(&self, id: Uuid) -> Result<Option<ChatMessage>, StoreError> {
			self.inner.get_message(id).await
		}
		async fn delete_message(&self, id: Uuid) -> Result<bool, StoreError> {
			self.inner.delete_message(id).await
		}
		async fn list_room_messages(&self, room_id: Uuid) -> Result<Vec<ChatMessage>, StoreError> {
			self.inner.list_room_messages(room_id).await
		}
		async fn foreign_message_ids(&self, room_id: Uuid, reader: Uuid) -> Result<Vec<Uuid>, StoreError> {
			self.inner.foreign_message_ids(room_id, reader).await
		}
		async fn upsert_block(&self, blocker: Uuid, blocked: Uuid) -> Result<(), StoreError> {
			self.inner.upsert_block(blocker, blocked).await
		}
		async fn delete_block(&self, blocker: Uuid, blocked: Uuid) -> Result<bool, StoreError> {
			self.inner.delete_block(blocker, blocked).await
		}
		async fn block_exists(&self, blocker: Uuid, blocked: Uuid) -> Result<bool, StoreError> {
			self.inner.block_exists(blocker, blocked).await
		}
		async fn insert_dismissal(&self, dismissal: &Dismissal) -> Result<(), StoreError> {
			self.inner.insert_dismissal(dismissal).await
		}
		async fn delete_dismissal(
			&self,
			user_id: Uuid,
			kind: DismissKind,
			target_id: Uuid,
		) -> Result<bool, StoreError> {
			self.inner.delete_dismissal(user_id, kind, target_id).await
		}
		async fn list_dismissed(&self, user_id: Uuid, kind: DismissKind) -> Result<Vec<Uuid>, StoreError> {
			self.inner.list_dismissed(user_id, kind).await
		}
		async fn upsert_read_receipts(&self, reader: Uuid, message_ids: &[Uuid]) -> Result<(), StoreError> {
			self.inner.upsert_read_receipts(reader, message_ids).await
		}
		async fn count_unread(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<i64, StoreError> {
			self.inner.count_unread(user_id, since).await
		}
	}

	#[tokio::test]
	async fn provisioner_recovers_from_lost_insert_race() {
		let store = Arc::new(ForgetfulStore {
			inner: InMemoryStore::new(),
			forget_next_find: AtomicBool::new(false),
			stale_pending: AtomicBool::new(false),
		});
		let provisioner = RoomProvisioner::new(store.clone());

		let offer = Offer {
			id: Uuid::new_v4(),
			sender_user_id: Uuid::new_v4(),
			receiver_user_id: Uuid::new_v4(),
			campaign_name: "Race".into(),
			campaign_type: "reel".into(),
			budget: None,
			payment_type: PaymentType::Barter,
			message: String::new(),
			status: OfferStatus::Accepted,
			created_at: Utc::now(),
		};

		let first = provisioner.ensure_room_for_offer(&offer).await.unwrap();

		// Second caller misses the lookup, inserts, hits the unique key and
		// must come back with the first caller's room.
		store.forget_next_find.store(true, Ordering::SeqCst);
		let second = provisioner.ensure_room_for_offer(&offer).await.unwrap();
		assert_eq!(first.id, second.id);
	}

	#[tokio::test]
	async fn lost_transition_race_reports_invalid_state() {
		let store = Arc::new(ForgetfulStore {
			inner: InMemoryStore::new(),
			forget_next_find: AtomicBool::new(false),
			stale_pending: AtomicBool::new(false),
		});
		let events = EventHub::default();
		let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
		let rooms = RoomProvisioner::new(store.clone());
		let offers = OfferLifecycle::new(store.clone(), rooms, events, notifier);

		let (b1, i1) = (brand(), influencer());
		let offer = offers.create(b1, offer_to(i1.user_id)).await.unwrap();
		offers.transition(i1, offer.id, OfferStatus::Accepted).await.unwrap();

		// A concurrent caller read the row before the winner's update
		// landed, passes the precondition and loses the conditional
		// update.
		store.stale_pending.store(true, Ordering::SeqCst);
		let lost = offers.transition(i1, offer.id, OfferStatus::Rejected).await;
		assert_eq!(lost.unwrap_err(), ServiceError::InvalidState);

		// The winner's decision survives the lost race.
		store.stale_pending.store(false, Ordering::SeqCst);
		let stored = store.get_offer(offer.id).await.unwrap().unwrap();
		assert_eq!(stored.status, OfferStatus::Accepted);
	}

	#[tokio::test]
	async fn accepted_offer_without_room_heals_on_retry() {
		let fx = fixture();
		let (b1, i1) = (brand(), influencer());

		// An accepted row whose room insert never landed, as left behind
		// by a crash between the status update and the provisioner call.
		let offer = Offer {
			id: Uuid::new_v4(),
			sender_user_id: b1.user_id,
			receiver_user_id: i1.user_id,
			campaign_name: "Summer Launch".into(),
			campaign_type: "story".into(),
			budget: None,
			payment_type: PaymentType::Cash,
			message: String::new(),
			status: OfferStatus::Accepted,
			created_at: Utc::now(),
		};
		fx.store.insert_offer(&offer).await.unwrap();

		let outcome = fx.offers.transition(i1, offer.id, OfferStatus::Accepted).await.unwrap();
		let room_id = outcome.room_id.expect("retry must provision the room");
		let room = fx.store.find_room_by_offer(offer.id).await.unwrap().unwrap();
		assert_eq!(room.id, room_id);
	}

	#[tokio::test]
	async fn direct_room_is_unique_per_pair() {
		let fx = fixture();
		let (b1, i1) = (brand(), influencer());

		let first = fx.rooms.ensure_direct_room(b1.user_id, i1.user_id).await.unwrap();
		let second = fx.rooms.ensure_direct_room(b1.user_id, i1.user_id).await.unwrap();
		assert_eq!(first.id, second.id);
		assert!(first.offer_id.is_none());
	}

	#[tokio::test]
	async fn blocking_gates_sends_in_both_directions() {
		let fx = fixture();
		let (b1, i1) = (brand(), influencer());
		let offer = fx.offers.create(b1, offer_to(i1.user_id)).await.unwrap();
		let room_id = fx
			.offers
			.transition(i1, offer.id, OfferStatus::Accepted)
			.await
			.unwrap()
			.room_id
			.unwrap();

		let sent = fx.gateway.send(i1, room_id, "Merhaba").await.unwrap();
		assert_eq!(sent.sender_id, i1.user_id);
		assert_eq!(sent.content, "Merhaba");

		fx.blocks.block(b1, i1.user_id).await.unwrap();
		assert_eq!(fx.gateway.send(i1, room_id, "still there?").await.unwrap_err(), ServiceError::Blocked);
		// The blocker cannot send either.
		assert_eq!(fx.gateway.send(b1, room_id, "one-way?").await.unwrap_err(), ServiceError::Blocked);

		fx.blocks.unblock(b1, i1.user_id).await.unwrap();
		assert!(fx.gateway.send(i1, room_id, "back again").await.is_ok());
	}

	#[tokio::test]
	async fn block_is_idempotent_and_rejects_self() {
		let fx = fixture();
		let (b1, i1) = (brand(), influencer());

		fx.blocks.block(b1, i1.user_id).await.unwrap();
		fx.blocks.block(b1, i1.user_id).await.unwrap();

		let status = fx.blocks.status(b1, i1.user_id).await.unwrap();
		assert!(status.has_blocked);
		assert!(!status.blocked_by);

		let other_side = fx.blocks.status(i1, b1.user_id).await.unwrap();
		assert!(!other_side.has_blocked);
		assert!(other_side.blocked_by);

		let err = fx.blocks.block(b1, b1.user_id).await;
		assert!(matches!(err.unwrap_err(), ServiceError::InvalidArgument(_)));
	}

	#[tokio::test]
	async fn send_preconditions() {
		let fx = fixture();
		let (b1, i1) = (brand(), influencer());
		let room = fx.rooms.ensure_direct_room(b1.user_id, i1.user_id).await.unwrap();

		assert!(matches!(
			fx.gateway.send(b1, room.id, "   ").await.unwrap_err(),
			ServiceError::InvalidArgument(_)
		));
		assert_eq!(
			fx.gateway.send(influencer(), room.id, "hi").await.unwrap_err(),
			ServiceError::Forbidden
		);
		assert_eq!(
			fx.gateway.send(b1, Uuid::new_v4(), "hi").await.unwrap_err(),
			ServiceError::NotFound
		);

		let sent = fx.gateway.send(b1, room.id, "  trimmed  ").await.unwrap();
		assert_eq!(sent.content, "trimmed");
		let touched = fx.store.get_room(room.id).await.unwrap().unwrap();
		assert_eq!(touched.last_message_at, Some(sent.created_at));
	}

	#[tokio::test]
	async fn message_listing_is_participant_only_and_ordered() {
		let fx = fixture();
		let (b1, i1) = (brand(), influencer());
		let room = fx.rooms.ensure_direct_room(b1.user_id, i1.user_id).await.unwrap();

		fx.gateway.send(b1, room.id, "first").await.unwrap();
		fx.gateway.send(i1, room.id, "second").await.unwrap();

		let listed = fx.gateway.list(b1, room.id).await.unwrap();
		assert_eq!(
			listed.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
			vec!["first", "second"]
		);
		assert_eq!(fx.gateway.list(influencer(), room.id).await.unwrap_err(), ServiceError::Forbidden);
	}

	#[tokio::test]
	async fn room_listing_orders_by_activity() {
		let fx = fixture();
		let (b1, i1, i2) = (brand(), influencer(), influencer());
		let quiet = fx.rooms.ensure_direct_room(b1.user_id, i1.user_id).await.unwrap();
		let active = fx.rooms.ensure_direct_room(b1.user_id, i2.user_id).await.unwrap();

		fx.gateway.send(b1, active.id, "ping").await.unwrap();

		let listed = fx.gateway.rooms(b1).await.unwrap();
		assert_eq!(
			listed.iter().map(|r| r.id).collect::<Vec<_>>(),
			vec![active.id, quiet.id]
		);
		// Non-participants see neither room.
		assert!(fx.gateway.rooms(influencer()).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn admin_delete_is_privileged() {
		let fx = fixture();
		let (b1, i1) = (brand(), influencer());
		let room = fx.rooms.ensure_direct_room(b1.user_id, i1.user_id).await.unwrap();
		let message = fx.gateway.send(b1, room.id, "remove me").await.unwrap();

		assert_eq!(fx.gateway.delete(b1, message.id).await.unwrap_err(), ServiceError::Forbidden);

		fx.gateway.delete(admin(), message.id).await.unwrap();
		assert!(fx.store.get_message(message.id).await.unwrap().is_none());
		assert_eq!(fx.gateway.delete(admin(), message.id).await.unwrap_err(), ServiceError::NotFound);
	}

	#[tokio::test]
	async fn dismiss_is_idempotent_per_namespace() {
		let fx = fixture();
		let (b1, i1) = (brand(), influencer());

		fx.dismissals
			.dismiss(b1, DismissKind::Counterpart, i1.user_id)
			.await
			.unwrap();
		fx.dismissals
			.dismiss(b1, DismissKind::Counterpart, i1.user_id)
			.await
			.unwrap();

		let hidden = fx.dismissals.list(b1, DismissKind::Counterpart).await.unwrap();
		assert_eq!(hidden, vec![i1.user_id]);
		// The other namespace stays empty.
		assert!(fx.dismissals.list(b1, DismissKind::Offer).await.unwrap().is_empty());

		fx.dismissals
			.undismiss(b1, DismissKind::Counterpart, i1.user_id)
			.await
			.unwrap();
		assert!(fx.dismissals.list(b1, DismissKind::Counterpart).await.unwrap().is_empty());
		// Undismissing twice is still success.
		fx.dismissals
			.undismiss(b1, DismissKind::Counterpart, i1.user_id)
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn offer_dismissal_checks_receiver() {
		let fx = fixture();
		let (b1, i1) = (brand(), influencer());
		let offer = fx.offers.create(b1, offer_to(i1.user_id)).await.unwrap();

		assert_eq!(
			fx.dismissals.dismiss(brand(), DismissKind::Offer, offer.id).await.unwrap_err(),
			ServiceError::Forbidden
		);
		assert_eq!(
			fx.dismissals.dismiss(i1, DismissKind::Offer, Uuid::new_v4()).await.unwrap_err(),
			ServiceError::NotFound
		);

		fx.dismissals.dismiss(i1, DismissKind::Offer, offer.id).await.unwrap();
		let hidden = fx.dismissals.list(i1, DismissKind::Offer).await.unwrap();
		assert_eq!(hidden, vec![offer.id]);
	}

	#[tokio::test]
	async fn mark_room_read_is_idempotent() {
		let fx = fixture();
		let (b1, i1) = (brand(), influencer());
		let room = fx.rooms.ensure_direct_room(b1.user_id, i1.user_id).await.unwrap();

		fx.gateway.send(b1, room.id, "one").await.unwrap();
		fx.gateway.send(b1, room.id, "two").await.unwrap();

		assert_eq!(fx.reads.unread_count(i1).await.unwrap(), 2);
		// Own messages never count as unread.
		assert_eq!(fx.reads.unread_count(b1).await.unwrap(), 0);

		fx.reads.mark_room_read(i1, room.id).await.unwrap();
		assert_eq!(fx.reads.unread_count(i1).await.unwrap(), 0);
		fx.reads.mark_room_read(i1, room.id).await.unwrap();
		assert_eq!(fx.reads.unread_count(i1).await.unwrap(), 0);
	}

	#[tokio::test]
	async fn unread_count_is_window_bounded() {
		let fx = fixture();
		let (b1, i1) = (brand(), influencer());
		let room = fx.rooms.ensure_direct_room(b1.user_id, i1.user_id).await.unwrap();

		// An old message slips past the recency window and is not counted.
		let stale = ChatMessage {
			id: Uuid::new_v4(),
			room_id: room.id,
			sender_id: b1.user_id,
			content: "ancient".into(),
			created_at: Utc::now() - Duration::days(30),
		};
		fx.store.insert_message(&stale).await.unwrap();
		fx.gateway.send(b1, room.id, "fresh").await.unwrap();

		assert_eq!(fx.reads.unread_count(i1).await.unwrap(), 1);
	}

	#[tokio::test]
	async fn mutations_publish_domain_events() {
		let fx = fixture();
		let mut subscription = fx.events.subscribe();
		let (b1, i1) = (brand(), influencer());

		let offer = fx.offers.create(b1, offer_to(i1.user_id)).await.unwrap();
		assert!(matches!(subscription.recv().await.unwrap(), DomainEvent::OfferCreated { offer_id, .. } if offer_id == offer.id));

		let outcome = fx.offers.transition(i1, offer.id, OfferStatus::Accepted).await.unwrap();
		match subscription.recv().await.unwrap() {
			DomainEvent::OfferTransitioned { offer_id, status, room_id, .. } => {
				assert_eq!(offer_id, offer.id);
				assert_eq!(status, OfferStatus::Accepted);
				assert_eq!(room_id, outcome.room_id);
			}
			other => panic!("unexpected event {:?}", other),
		}

		let sent = fx.gateway.send(i1, outcome.room_id.unwrap(), "hello").await.unwrap();
		match subscription.recv().await.unwrap() {
			DomainEvent::MessageSent {
				message_id,
				recipient_id,
				..
			} => {
				assert_eq!(message_id, sent.id);
				assert_eq!(recipient_id, b1.user_id);
			}
			other => panic!("unexpected event {:?}", other),
		}
	}

	fn fixture() -> Fixture {
		let store = Arc::new(InMemoryStore::new());
		let events = EventHub::default();
		let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
		let rooms = RoomProvisioner::new(store.clone());
		Fixture {
			offers: OfferLifecycle::new(store.clone(), rooms.clone(), events.clone(), notifier.clone()),
			blocks: BlockService::new(store.clone()),
			gateway: MessageGateway::new(
				store.clone(),
				BlockService::new(store.clone()),
				events.clone(),
				notifier.clone(),
			),
			dismissals: DismissalService::new(store.clone()),
			reads: ReadTracker::new(store.clone(), 7),
			rooms,
			events,
			store,
		}
	}
}
