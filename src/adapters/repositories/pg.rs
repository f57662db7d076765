use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::chat::ChatMessage;
use crate::domain::dismissal::{DismissKind, Dismissal};
use crate::domain::offer::{Offer, OfferStatus};
use crate::domain::room::Room;

use super::{MarketStore, StoreError};

/// Postgres-backed [`MarketStore`]. Uniqueness and the offer
/// compare-and-swap are enforced by the schema in `migrations/`, so this
/// adapter stays a thin query layer.
pub struct PgMarketStore {
	pool: &'static PgPool,
}

impl PgMarketStore {
	pub fn new(pool: &'static PgPool) -> Self {
		Self { pool }
	}
}

fn map_err(err: sqlx::Error) -> StoreError {
	if let sqlx::Error::Database(ref db) = err {
		if db.code().as_deref() == Some("23505") {
			return StoreError::UniqueViolation;
		}
	}
	StoreError::Database(err.to_string())
}

#[async_trait]
impl MarketStore for PgMarketStore {
	async fn insert_offer(&self, offer: &Offer) -> Result<(), StoreError> {
		sqlx::query(
			"INSERT INTO offers \
			 (id, sender_user_id, receiver_user_id, campaign_name, campaign_type, budget, payment_type, message, status, created_at) \
			 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
		)
		.bind(offer.id)
		.bind(offer.sender_user_id)
		.bind(offer.receiver_user_id)
		.bind(&offer.campaign_name)
		.bind(&offer.campaign_type)
		.bind(offer.budget)
		.bind(offer.payment_type)
		.bind(&offer.message)
		.bind(offer.status)
		.bind(offer.created_at)
		.execute(self.pool)
		.await
		.map_err(map_err)?;
		Ok(())
	}

	async fn get_offer(&self, id: Uuid) -> Result<Option<Offer>, StoreError> {
		sqlx::query_as::<_, Offer>("SELECT * FROM offers WHERE id = $1")
			.bind(id)
			.fetch_optional(self.pool)
			.await
			.map_err(map_err)
	}

	async fn transition_offer(
		&self,
		id: Uuid,
		from: OfferStatus,
		to: OfferStatus,
	) -> Result<bool, StoreError> {
		let result = sqlx::query("UPDATE offers SET status = $1 WHERE id = $2 AND status = $3")
			.bind(to)
			.bind(id)
			.bind(from)
			.execute(self.pool)
			.await
			.map_err(map_err)?;
		Ok(result.rows_affected() == 1)
	}

	async fn insert_room(&self, room: &Room) -> Result<(), StoreError> {
		sqlx::query(
			"INSERT INTO rooms (id, offer_id, brand_id, influencer_id, last_message_at) \
			 VALUES ($1, $2, $3, $4, $5)",
		)
		.bind(room.id)
		.bind(room.offer_id)
		.bind(room.brand_id)
		.bind(room.influencer_id)
		.bind(room.last_message_at)
		.execute(self.pool)
		.await
		.map_err(map_err)?;
		Ok(())
	}

	async fn get_room(&self, id: Uuid) -> Result<Option<Room>, StoreError> {
		sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE id = $1")
			.bind(id)
			.fetch_optional(self.pool)
			.await
			.map_err(map_err)
	}

	async fn find_room_by_offer(&self, offer_id: Uuid) -> Result<Option<Room>, StoreError> {
		sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE offer_id = $1")
			.bind(offer_id)
			.fetch_optional(self.pool)
			.await
			.map_err(map_err)
	}

	async fn find_room_by_pair(&self, a: Uuid, b: Uuid) -> Result<Option<Room>, StoreError> {
		sqlx::query_as::<_, Room>(
			"SELECT * FROM rooms WHERE offer_id IS NULL \
			 AND ((brand_id = $1 AND influencer_id = $2) OR (brand_id = $2 AND influencer_id = $1))",
		)
		.bind(a)
		.bind(b)
		.fetch_optional(self.pool)
		.await
		.map_err(map_err)
	}

	async fn rooms_for_user(&self, user_id: Uuid) -> Result<Vec<Room>, StoreError> {
		sqlx::query_as::<_, Room>(
			"SELECT * FROM rooms WHERE brand_id = $1 OR influencer_id = $1 \
			 ORDER BY last_message_at DESC NULLS LAST",
		)
		.bind(user_id)
		.fetch_all(self.pool)
		.await
		.map_err(map_err)
	}

	async fn touch_room_activity(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
		sqlx::query("UPDATE rooms SET last_message_at = $1 WHERE id = $2")
			.bind(at)
			.bind(id)
			.execute(self.pool)
			.await
			.map_err(map_err)?;
		Ok(())
	}

	async fn insert_message(&self, message: &ChatMessage) -> Result<(), StoreError> {
		sqlx::query(
			"INSERT INTO messages (id, room_id, sender_id, content, created_at) \
			 VALUES ($1, $2, $3, $4, $5)",
		)
		.bind(message.id)
		.bind(message.room_id)
		.bind(message.sender_id)
		.bind(&message.content)
		.bind(message.created_at)
		.execute(self.pool)
		.await
		.map_err(map_err)?;
		Ok(())
	}

	async fn get_message(&self, id: Uuid) -> Result<Option<ChatMessage>, StoreError> {
		sqlx::query_as::<_, ChatMessage>("SELECT * FROM messages WHERE id = $1")
			.bind(id)
			.fetch_optional(self.pool)
			.await
			.map_err(map_err)
	}

	async fn delete_message(&self, id: Uuid) -> Result<bool, StoreError> {
		let result = sqlx::query("DELETE FROM messages WHERE id = $1")
			.bind(id)
			.execute(self.pool)
			.await
			.map_err(map_err)?;
		Ok(result.rows_affected() == 1)
	}

	async fn list_room_messages(&self, room_id: Uuid) -> Result<Vec<ChatMessage>, StoreError> {
		sqlx::query_as::<_, ChatMessage>(
			"SELECT * FROM messages WHERE room_id = $1 ORDER BY created_at, id",
		)
		.bind(room_id)
		.fetch_all(self.pool)
		.await
		.map_err(map_err)
	}

	async fn foreign_message_ids(&self, room_id: Uuid, reader: Uuid) -> Result<Vec<Uuid>, StoreError> {
		sqlx::query_scalar::<_, Uuid>(
			"SELECT id FROM messages WHERE room_id = $1 AND sender_id <> $2",
		)
		.bind(room_id)
		.bind(reader)
		.fetch_all(self.pool)
		.await
		.map_err(map_err)
	}

	async fn upsert_block(&self, blocker: Uuid, blocked: Uuid) -> Result<(), StoreError> {
		sqlx::query(
			"INSERT INTO user_blocks (blocker_user_id, blocked_user_id) VALUES ($1, $2) \
			 ON CONFLICT (blocker_user_id, blocked_user_id) DO NOTHING",
		)
		.bind(blocker)
		.bind(blocked)
		.execute(self.pool)
		.await
		.map_err(map_err)?;
		Ok(())
	}

	async fn delete_block(&self, blocker: Uuid, blocked: Uuid) -> Result<bool, StoreError> {
		let result = sqlx::query(
			"DELETE FROM user_blocks WHERE blocker_user_id = $1 AND blocked_user_id = $2",
		)
		.bind(blocker)
		.bind(blocked)
		.execute(self.pool)
		.await
		.map_err(map_err)?;
		Ok(result.rows_affected() == 1)
	}

	async fn block_exists(&self, blocker: Uuid, blocked: Uuid) -> Result<bool, StoreError> {
		sqlx::query_scalar::<_, bool>(
			"SELECT EXISTS (SELECT 1 FROM user_blocks WHERE blocker_user_id = $1 AND blocked_user_id = $2)",
		)
		.bind(blocker)
		.bind(blocked)
		.fetch_one(self.pool)
		.await
		.map_err(map_err)
	}

	async fn insert_dismissal(&self, dismissal: &Dismissal) -> Result<(), StoreError> {
		// One row type, two namespaces: the kind decides which nullable
		// column carries the target.
		let (receiver_user_id, offer_id) = match dismissal.kind {
			DismissKind::Counterpart => (Some(dismissal.target_id), None),
			DismissKind::Offer => (None, Some(dismissal.target_id)),
		};
		sqlx::query(
			"INSERT INTO dismissed_offers (user_id, receiver_user_id, offer_id) VALUES ($1, $2, $3)",
		)
		.bind(dismissal.user_id)
		.bind(receiver_user_id)
		.bind(offer_id)
		.execute(self.pool)
		.await
		.map_err(map_err)?;
		Ok(())
	}

	async fn delete_dismissal(
		&self,
		user_id: Uuid,
		kind: DismissKind,
		target_id: Uuid,
	) -> Result<bool, StoreError> {
		let query = match kind {
			DismissKind::Counterpart => {
				"DELETE FROM dismissed_offers WHERE user_id = $1 AND receiver_user_id = $2"
			}
			DismissKind::Offer => "DELETE FROM dismissed_offers WHERE user_id = $1 AND offer_id = $2",
		};
		let result = sqlx::query(query)
			.bind(user_id)
			.bind(target_id)
			.execute(self.pool)
			.await
			.map_err(map_err)?;
		Ok(result.rows_affected() >= 1)
	}

	async fn list_dismissed(&self, user_id: Uuid, kind: DismissKind) -> Result<Vec<Uuid>, StoreError> {
		let query = match kind {
			DismissKind::Counterpart => {
				"SELECT receiver_user_id FROM dismissed_offers WHERE user_id = $1 AND receiver_user_id IS NOT NULL"
			}
			DismissKind::Offer => {
				"SELECT offer_id FROM dismissed_offers WHERE user_id = $1 AND offer_id IS NOT NULL"
			}
		};
		sqlx::query_scalar::<_, Uuid>(query)
			.bind(user_id)
			.fetch_all(self.pool)
			.await
			.map_err(map_err)
	}

	async fn upsert_read_receipts(&self, reader: Uuid, message_ids: &[Uuid]) -> Result<(), StoreError> {
		if message_ids.is_empty() {
			return Ok(());
		}
		sqlx::query(
			"INSERT INTO message_reads (message_id, user_id) \
			 SELECT UNNEST($1::uuid[]), $2 \
			 ON CONFLICT (message_id, user_id) DO NOTHING",
		)
		.bind(message_ids)
		.bind(reader)
		.execute(self.pool)
		.await
		.map_err(map_err)?;
		Ok(())
	}

	async fn count_unread(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<i64, StoreError> {
		sqlx::query_scalar::<_, i64>(
			"SELECT COUNT(*) FROM messages m \
			 JOIN rooms r ON r.id = m.room_id \
			 WHERE (r.brand_id = $1 OR r.influencer_id = $1) \
			   AND m.sender_id <> $1 \
			   AND m.created_at >= $2 \
			   AND NOT EXISTS (SELECT 1 FROM message_reads mr WHERE mr.message_id = m.id AND mr.user_id = $1)",
		)
		.bind(user_id)
		.bind(since)
		.fetch_one(self.pool)
		.await
		.map_err(map_err)
	}
}
