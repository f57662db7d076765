use std::fmt::Display;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::adapters::repositories::StoreError;

/// Error taxonomy for the pipeline. Every operation returns one of these to
/// its immediate caller; nothing here should ever take the process down.
#[derive(Debug, PartialEq, Eq)]
pub enum ServiceError {
	/// The referenced offer, room or message does not exist.
	NotFound,
	/// Caller is not a party to the resource, or lacks the required role.
	Forbidden,
	/// A state-machine precondition failed; the client should refresh and
	/// show the real current status.
	InvalidState,
	/// Malformed input: empty message content, self-block, bad target
	/// status.
	InvalidArgument(String),
	/// Messaging refusal: one side of the room blocks the other.
	Blocked,
	/// Lost a race that the caller must observe (idempotent operations
	/// swallow their conflicts before reaching here).
	Conflict,
	Database(String),
}

impl Display for ServiceError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ServiceError::NotFound => write!(f, "resource not found"),
			ServiceError::Forbidden => write!(f, "caller is not a party to this resource"),
			ServiceError::InvalidState => write!(f, "only pending offers can be updated"),
			ServiceError::InvalidArgument(msg) => write!(f, "{}", msg),
			ServiceError::Blocked => write!(f, "messaging between these users is blocked"),
			ServiceError::Conflict => write!(f, "operation lost a concurrent race"),
			ServiceError::Database(msg) => write!(f, "storage failure: {}", msg),
		}
	}
}

impl std::error::Error for ServiceError {}

impl From<StoreError> for ServiceError {
	fn from(value: StoreError) -> Self {
		match value {
			StoreError::UniqueViolation => ServiceError::Conflict,
			StoreError::Database(msg) => ServiceError::Database(msg),
		}
	}
}

impl IntoResponse for ServiceError {
	fn into_response(self) -> Response {
		let status = match self {
			ServiceError::NotFound => StatusCode::NOT_FOUND,
			ServiceError::Forbidden | ServiceError::Blocked => StatusCode::FORBIDDEN,
			ServiceError::InvalidState | ServiceError::Conflict => StatusCode::CONFLICT,
			ServiceError::InvalidArgument(_) => StatusCode::UNPROCESSABLE_ENTITY,
			ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
		};
		if status == StatusCode::INTERNAL_SERVER_ERROR {
			tracing::error!("request failed: {}", self);
		}
		(status, Json(json!({ "error": self.to_string() }))).into_response()
	}
}
