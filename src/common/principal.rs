use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authenticated caller, as resolved by the fronting auth layer.
/// Authentication itself is an external concern; this service trusts the
/// identity headers the gateway sets after session validation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Principal {
	pub user_id: Uuid,
	pub role: Role,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	Brand,
	Influencer,
	Admin,
}

impl Principal {
	pub fn is_admin(&self) -> bool {
		matches!(self.role, Role::Admin)
	}

	pub fn is_brand(&self) -> bool {
		matches!(self.role, Role::Brand)
	}
}

impl std::str::FromStr for Role {
	type Err = ();
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"brand" => Ok(Role::Brand),
			"influencer" => Ok(Role::Influencer),
			"admin" => Ok(Role::Admin),
			_ => Err(()),
		}
	}
}

/// Reads `x-user-id` / `x-user-role` into a [`Principal`] extension.
/// Requests without a resolvable principal are rejected before any handler
/// runs.
pub async fn set_principal<B>(mut request: Request<B>, next: Next<B>) -> Result<Response, StatusCode> {
	let headers = request.headers();

	let user_id = headers
		.get("x-user-id")
		.and_then(|v| v.to_str().ok())
		.and_then(|v| Uuid::parse_str(v).ok())
		.ok_or(StatusCode::UNAUTHORIZED)?;

	let role = headers
		.get("x-user-role")
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.parse::<Role>().ok())
		.ok_or(StatusCode::UNAUTHORIZED)?;

	request.extensions_mut().insert(Principal { user_id, role });

	Ok(next.run(request).await)
}
