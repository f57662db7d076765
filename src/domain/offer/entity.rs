use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A campaign proposal sent by a brand to an influencer.
///
/// Offers are append-only from the brand's side: after creation only the
/// receiving influencer may move `status`, and only once, away from
/// [`OfferStatus::Pending`].
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Offer {
	pub id: Uuid,
	pub sender_user_id: Uuid,
	pub receiver_user_id: Uuid,
	pub campaign_name: String,
	pub campaign_type: String,
	pub budget: Option<Decimal>,
	pub payment_type: PaymentType,
	pub message: String,
	pub status: OfferStatus,
	pub created_at: DateTime<Utc>,
}

/// Canonical offer state machine: `pending` is the only state transitions
/// may leave from. `accepted` and `hold` both provision a room; `hold` is a
/// soft accept that opens the chat without campaign commitment.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "offer_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
	#[default]
	Pending,
	Accepted,
	Rejected,
	Hold,
}

impl OfferStatus {
	pub fn is_pending(&self) -> bool {
		matches!(self, OfferStatus::Pending)
	}

	/// States that open a communication channel on transition.
	pub fn provisions_room(&self) -> bool {
		matches!(self, OfferStatus::Accepted | OfferStatus::Hold)
	}
}

impl std::fmt::Display for OfferStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			OfferStatus::Pending => "pending",
			OfferStatus::Accepted => "accepted",
			OfferStatus::Rejected => "rejected",
			OfferStatus::Hold => "hold",
		};
		write!(f, "{}", s)
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
	#[default]
	Cash,
	Barter,
}
