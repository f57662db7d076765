use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::chat::ChatMessage;
use crate::domain::dismissal::{DismissKind, Dismissal};
use crate::domain::offer::{Offer, OfferStatus};
use crate::domain::room::Room;

use super::{MarketStore, StoreError};

/// In-memory [`MarketStore`] mirroring the Postgres schema's unique keys
/// and the status compare-and-swap. Backs the unit tests and local runs
/// without a database.
#[derive(Default)]
pub struct InMemoryStore {
	inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
	offers: HashMap<Uuid, Offer>,
	rooms: Vec<Room>,
	messages: Vec<ChatMessage>,
	blocks: HashSet<(Uuid, Uuid)>,
	dismissals: HashSet<(Uuid, DismissKind, Uuid)>,
	reads: HashSet<(Uuid, Uuid)>,
}

impl InMemoryStore {
	pub fn new() -> Self {
		Self::default()
	}
}

fn same_pair(room: &Room, a: Uuid, b: Uuid) -> bool {
	(room.brand_id == a && room.influencer_id == b) || (room.brand_id == b && room.influencer_id == a)
}

#[async_trait]
impl MarketStore for InMemoryStore {
	async fn insert_offer(&self, offer: &Offer) -> Result<(), StoreError> {
		let mut inner = self.inner.lock().unwrap();
		if inner.offers.contains_key(&offer.id) {
			return Err(StoreError::UniqueViolation);
		}
		inner.offers.insert(offer.id, offer.clone());
		Ok(())
	}

	async fn get_offer(&self, id: Uuid) -> Result<Option<Offer>, StoreError> {
		Ok(self.inner.lock().unwrap().offers.get(&id).cloned())
	}

	async fn transition_offer(
		&self,
		id: Uuid,
		from: OfferStatus,
		to: OfferStatus,
	) -> Result<bool, StoreError> {
		let mut inner = self.inner.lock().unwrap();
		match inner.offers.get_mut(&id) {
			Some(offer) if offer.status == from => {
				offer.status = to;
				Ok(true)
			}
			_ => Ok(false),
		}
	}

	async fn insert_room(&self, room: &Room) -> Result<(), StoreError> {
		let mut inner = self.inner.lock().unwrap();
		let conflict = inner.rooms.iter().any(|existing| {
			existing.id == room.id
				|| match (room.offer_id, existing.offer_id) {
					(Some(offer_id), Some(other)) => offer_id == other,
					(None, None) => same_pair(existing, room.brand_id, room.influencer_id),
					_ => false,
				}
		});
		if conflict {
			return Err(StoreError::UniqueViolation);
		}
		inner.rooms.push(room.clone());
		Ok(())
	}

	async fn get_room(&self, id: Uuid) -> Result<Option<Room>, StoreError> {
		Ok(self.inner.lock().unwrap().rooms.iter().find(|r| r.id == id).cloned())
	}

	async fn find_room_by_offer(&self, offer_id: Uuid) -> Result<Option<Room>, StoreError> {
		Ok(self
			.inner
			.lock()
			.unwrap()
			.rooms
			.iter()
			.find(|r| r.offer_id == Some(offer_id))
			.cloned())
	}

	async fn find_room_by_pair(&self, a: Uuid, b: Uuid) -> Result<Option<Room>, StoreError> {
		Ok(self
			.inner
			.lock()
			.unwrap()
			.rooms
			.iter()
			.find(|r| r.offer_id.is_none() && same_pair(r, a, b))
			.cloned())
	}

	async fn rooms_for_user(&self, user_id: Uuid) -> Result<Vec<Room>, StoreError> {
		let mut rooms: Vec<Room> = self
			.inner
			.lock()
			.unwrap()
			.rooms
			.iter()
			.filter(|r| r.is_participant(user_id))
			.cloned()
			.collect();
		// Most recent activity first, never-used rooms last.
		rooms.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
		Ok(rooms)
	}

	async fn touch_room_activity(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
		let mut inner = self.inner.lock().unwrap();
		if let Some(room) = inner.rooms.iter_mut().find(|r| r.id == id) {
			room.last_message_at = Some(at);
		}
		Ok(())
	}

	async fn insert_message(&self, message: &ChatMessage) -> Result<(), StoreError> {
		let mut inner = self.inner.lock().unwrap();
		if inner.messages.iter().any(|m| m.id == message.id) {
			return Err(StoreError::UniqueViolation);
		}
		inner.messages.push(message.clone());
		Ok(())
	}

	async fn get_message(&self, id: Uuid) -> Result<Option<ChatMessage>, StoreError> {
		Ok(self.inner.lock().unwrap().messages.iter().find(|m| m.id == id).cloned())
	}

	async fn delete_message(&self, id: Uuid) -> Result<bool, StoreError> {
		let mut inner = self.inner.lock().unwrap();
		let before = inner.messages.len();
		inner.messages.retain(|m| m.id != id);
		Ok(inner.messages.len() < before)
	}

	async fn list_room_messages(&self, room_id: Uuid) -> Result<Vec<ChatMessage>, StoreError> {
		let inner = self.inner.lock().unwrap();
		let mut messages: Vec<ChatMessage> =
			inner.messages.iter().filter(|m| m.room_id == room_id).cloned().collect();
		messages.sort_by_key(|m| m.created_at);
		Ok(messages)
	}

	async fn foreign_message_ids(&self, room_id: Uuid, reader: Uuid) -> Result<Vec<Uuid>, StoreError> {
		Ok(self
			.inner
			.lock()
			.unwrap()
			.messages
			.iter()
			.filter(|m| m.room_id == room_id && m.sender_id != reader)
			.map(|m| m.id)
			.collect())
	}

	async fn upsert_block(&self, blocker: Uuid, blocked: Uuid) -> Result<(), StoreError> {
		self.inner.lock().unwrap().blocks.insert((blocker, blocked));
		Ok(())
	}

	async fn delete_block(&self, blocker: Uuid, blocked: Uuid) -> Result<bool, StoreError> {
		Ok(self.inner.lock().unwrap().blocks.remove(&(blocker, blocked)))
	}

	async fn block_exists(&self, blocker: Uuid, blocked: Uuid) -> Result<bool, StoreError> {
		Ok(self.inner.lock().unwrap().blocks.contains(&(blocker, blocked)))
	}

	async fn insert_dismissal(&self, dismissal: &Dismissal) -> Result<(), StoreError> {
		let key = (dismissal.user_id, dismissal.kind, dismissal.target_id);
		let mut inner = self.inner.lock().unwrap();
		if !inner.dismissals.insert(key) {
			return Err(StoreError::UniqueViolation);
		}
		Ok(())
	}

	async fn delete_dismissal(
		&self,
		user_id: Uuid,
		kind: DismissKind,
		target_id: Uuid,
	) -> Result<bool, StoreError> {
		Ok(self.inner.lock().unwrap().dismissals.remove(&(user_id, kind, target_id)))
	}

	async fn list_dismissed(&self, user_id: Uuid, kind: DismissKind) -> Result<Vec<Uuid>, StoreError> {
		Ok(self
			.inner
			.lock()
			.unwrap()
			.dismissals
			.iter()
			.filter(|(user, k, _)| *user == user_id && *k == kind)
			.map(|(_, _, target)| *target)
			.collect())
	}

	async fn upsert_read_receipts(&self, reader: Uuid, message_ids: &[Uuid]) -> Result<(), StoreError> {
		let mut inner = self.inner.lock().unwrap();
		for id in message_ids {
			inner.reads.insert((*id, reader));
		}
		Ok(())
	}

	async fn count_unread(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<i64, StoreError> {
		let inner = self.inner.lock().unwrap();
		let room_ids: HashSet<Uuid> = inner
			.rooms
			.iter()
			.filter(|r| r.is_participant(user_id))
			.map(|r| r.id)
			.collect();
		let count = inner
			.messages
			.iter()
			.filter(|m| {
				room_ids.contains(&m.room_id)
					&& m.sender_id != user_id
					&& m.created_at >= since
					&& !inner.reads.contains(&(m.id, user_id))
			})
			.count();
		Ok(count as i64)
	}
}
