use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Soft-hide marker. Two independent namespaces share one row type: an
/// influencer hides an offer, a brand hides a counterpart profile. Neither
/// deletes anything.
#[derive(Clone, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub struct Dismissal {
	pub user_id: Uuid,
	pub kind: DismissKind,
	pub target_id: Uuid,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DismissKind {
	Offer,
	Counterpart,
}
