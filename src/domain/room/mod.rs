use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A 1:1 channel between a brand and an influencer.
///
/// `offer_id` is set for rooms opened by an offer transition and `None` for
/// rooms opened administratively. Uniqueness is keyed on whichever is
/// present: the offer id, or the unordered participant pair.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Room {
	pub id: Uuid,
	pub offer_id: Option<Uuid>,
	pub brand_id: Uuid,
	pub influencer_id: Uuid,
	pub last_message_at: Option<DateTime<Utc>>,
}

impl Room {
	pub fn is_participant(&self, user_id: Uuid) -> bool {
		self.brand_id == user_id || self.influencer_id == user_id
	}

	/// The counterpart of `user_id`, if `user_id` is a participant.
	pub fn other_participant(&self, user_id: Uuid) -> Option<Uuid> {
		if self.brand_id == user_id {
			Some(self.influencer_id)
		} else if self.influencer_id == user_id {
			Some(self.brand_id)
		} else {
			None
		}
	}
}
