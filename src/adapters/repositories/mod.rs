pub mod memory;
pub mod pg;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::chat::ChatMessage;
use crate::domain::dismissal::{DismissKind, Dismissal};
use crate::domain::offer::{Offer, OfferStatus};
use crate::domain::room::Room;

/// Failures crossing the repository boundary. Uniqueness violations get
/// their own variant because several callers (room provisioner, dismissal
/// store, block upsert) recover from them instead of failing.
#[derive(Debug)]
pub enum StoreError {
	UniqueViolation,
	Database(String),
}

impl std::fmt::Display for StoreError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			StoreError::UniqueViolation => write!(f, "unique constraint violated"),
			StoreError::Database(msg) => write!(f, "database error: {}", msg),
		}
	}
}

impl std::error::Error for StoreError {}

/// Persistence seam for the offer/room/messaging pipeline.
///
/// Every cross-row invariant lives behind this trait as a store-level
/// primitive (conditional update for the offer state machine, unique keys
/// for rooms, blocks, dismissals and read receipts) so that multiple
/// service instances stay correct without in-process locks.
#[async_trait]
pub trait MarketStore: Send + Sync {
	// offers
	async fn insert_offer(&self, offer: &Offer) -> Result<(), StoreError>;
	async fn get_offer(&self, id: Uuid) -> Result<Option<Offer>, StoreError>;

	/// Compare-and-swap on `status`. Returns `true` only for the caller
	/// whose update moved the row from `from` to `to`.
	async fn transition_offer(
		&self,
		id: Uuid,
		from: OfferStatus,
		to: OfferStatus,
	) -> Result<bool, StoreError>;

	// rooms
	async fn insert_room(&self, room: &Room) -> Result<(), StoreError>;
	async fn get_room(&self, id: Uuid) -> Result<Option<Room>, StoreError>;
	async fn find_room_by_offer(&self, offer_id: Uuid) -> Result<Option<Room>, StoreError>;

	/// Offer-less room lookup; the pair is unordered.
	async fn find_room_by_pair(&self, a: Uuid, b: Uuid) -> Result<Option<Room>, StoreError>;
	async fn rooms_for_user(&self, user_id: Uuid) -> Result<Vec<Room>, StoreError>;
	async fn touch_room_activity(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

	// messages
	async fn insert_message(&self, message: &ChatMessage) -> Result<(), StoreError>;
	async fn get_message(&self, id: Uuid) -> Result<Option<ChatMessage>, StoreError>;
	async fn delete_message(&self, id: Uuid) -> Result<bool, StoreError>;
	async fn list_room_messages(&self, room_id: Uuid) -> Result<Vec<ChatMessage>, StoreError>;

	/// Ids of messages in the room sent by someone other than `reader`.
	async fn foreign_message_ids(&self, room_id: Uuid, reader: Uuid) -> Result<Vec<Uuid>, StoreError>;

	// blocks
	async fn upsert_block(&self, blocker: Uuid, blocked: Uuid) -> Result<(), StoreError>;
	async fn delete_block(&self, blocker: Uuid, blocked: Uuid) -> Result<bool, StoreError>;
	async fn block_exists(&self, blocker: Uuid, blocked: Uuid) -> Result<bool, StoreError>;

	// dismissals
	async fn insert_dismissal(&self, dismissal: &Dismissal) -> Result<(), StoreError>;
	async fn delete_dismissal(
		&self,
		user_id: Uuid,
		kind: DismissKind,
		target_id: Uuid,
	) -> Result<bool, StoreError>;
	async fn list_dismissed(&self, user_id: Uuid, kind: DismissKind) -> Result<Vec<Uuid>, StoreError>;

	// read receipts
	async fn upsert_read_receipts(&self, reader: Uuid, message_ids: &[Uuid]) -> Result<(), StoreError>;

	/// Messages across the user's rooms, sent by others since `since`, with
	/// no receipt from the user.
	async fn count_unread(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<i64, StoreError>;
}
