use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entity::{OfferStatus, PaymentType};

/// Payload a brand submits to open a proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOffer {
	pub receiver_user_id: Uuid,
	pub campaign_name: String,
	pub campaign_type: String,
	pub budget: Option<Decimal>,
	pub payment_type: PaymentType,
	pub message: String,
}

/// Influencer's decision on a pending offer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TransitionOffer {
	pub status: OfferStatus,
}

/// Result of a lifecycle transition. `room_id` is set when the target
/// status provisioned (or reused) a room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TransitionOutcome {
	pub status: OfferStatus,
	pub room_id: Option<Uuid>,
}
