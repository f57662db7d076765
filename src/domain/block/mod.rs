use serde::{Deserialize, Serialize};

/// Both directions of block state between two users, from the first user's
/// perspective.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct BlockStatus {
	/// The queried user has blocked the counterpart.
	pub has_blocked: bool,
	/// The counterpart has blocked the queried user.
	pub blocked_by: bool,
}

impl BlockStatus {
	pub fn any(&self) -> bool {
		self.has_blocked || self.blocked_by
	}
}
