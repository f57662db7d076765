use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::offer::OfferStatus;

/// Domain event published after a successful mutation. Subscribers (the
/// websocket broker, client refresh triggers) consume these; correctness
/// never depends on delivery and clients poll as backstop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
	OfferCreated {
		offer_id: Uuid,
		sender_user_id: Uuid,
		receiver_user_id: Uuid,
	},
	OfferTransitioned {
		offer_id: Uuid,
		sender_user_id: Uuid,
		receiver_user_id: Uuid,
		status: OfferStatus,
		room_id: Option<Uuid>,
	},
	MessageSent {
		message_id: Uuid,
		room_id: Uuid,
		sender_id: Uuid,
		recipient_id: Uuid,
	},
}

impl DomainEvent {
	/// Users the event concerns; the websocket broker filters on these.
	pub fn participants(&self) -> [Uuid; 2] {
		match self {
			DomainEvent::OfferCreated {
				sender_user_id,
				receiver_user_id,
				..
			} => [*sender_user_id, *receiver_user_id],
			DomainEvent::OfferTransitioned {
				sender_user_id,
				receiver_user_id,
				..
			} => [*sender_user_id, *receiver_user_id],
			DomainEvent::MessageSent { sender_id, recipient_id, .. } => [*sender_id, *recipient_id],
		}
	}
}

/// In-process broadcast fan-out for [`DomainEvent`]s.
#[derive(Clone)]
pub struct EventHub(broadcast::Sender<DomainEvent>);

impl EventHub {
	pub fn new(capacity: usize) -> Self {
		let (tx, _rx) = broadcast::channel(capacity);
		Self(tx)
	}

	pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
		self.0.subscribe()
	}

	/// Publishing with zero subscribers is not an error.
	pub fn publish(&self, event: DomainEvent) {
		if let Err(err) = self.0.send(event) {
			tracing::debug!("no subscriber consumed domain event: {:?}", err.0);
		}
	}
}

impl Default for EventHub {
	fn default() -> Self {
		Self::new(256)
	}
}
