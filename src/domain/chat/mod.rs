// domain for messaging feature
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single chat line inside a room. Immutable once stored; only the admin
/// override path may remove one.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatMessage {
	pub id: Uuid,
	pub room_id: Uuid,
	pub sender_id: Uuid,
	pub content: String,
	pub created_at: DateTime<Utc>,
}
