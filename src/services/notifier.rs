use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outbound notification channel. Delivery is an external concern (push,
/// e-mail, in-app inbox); the pipeline only hands events over and never
/// waits for the result on the critical path.
#[async_trait]
pub trait Notifier: Send + Sync {
	async fn notify(
		&self,
		user_id: Uuid,
		title: String,
		message: String,
		category: NotificationCategory,
	) -> Result<(), NotifyError>;
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
	Offer,
	Message,
	System,
}

#[derive(Debug)]
pub struct NotifyError(pub String);

impl std::fmt::Display for NotifyError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "notification dispatch failed: {}", self.0)
	}
}

/// Default implementation: record the notification in the service log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
	async fn notify(
		&self,
		user_id: Uuid,
		title: String,
		message: String,
		category: NotificationCategory,
	) -> Result<(), NotifyError> {
		tracing::info!(%user_id, ?category, title, message, "notification dispatched");
		Ok(())
	}
}

/// Fire-and-forget dispatch. Failures are logged and discarded; a missed
/// notification must never surface as a failed send or transition.
pub fn dispatch(
	notifier: Arc<dyn Notifier>,
	user_id: Uuid,
	title: impl Into<String>,
	message: impl Into<String>,
	category: NotificationCategory,
) {
	let (title, message) = (title.into(), message.into());
	tokio::spawn(async move {
		if let Err(err) = notifier.notify(user_id, title, message, category).await {
			tracing::warn!(%user_id, "{}", err);
		}
	});
}
