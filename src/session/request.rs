//! Typed inputs for the session flows.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Credentials presented to [`SessionManager::login`](crate::session::SessionManager::login).
#[derive(Clone)]
pub struct LoginRequest {
	/// Account email; trimmed and lower-cased for rate limiting.
	pub email: String,
	/// Plain password, only forwarded to the credential verifier.
	pub password: TokenSecret,
	/// Caller address used for the per-IP limiter.
	pub client_ip: IpAddr,
	/// Per-call deadline for each dependency call; falls back to the configured default.
	pub deadline: Option<Duration>,
}
impl LoginRequest {
	/// Creates a login request.
	pub fn new(email: impl Into<String>, password: impl Into<String>, client_ip: IpAddr) -> Self {
		Self {
			email: email.into(),
			password: TokenSecret::new(password),
			client_ip,
			deadline: None,
		}
	}

	/// Overrides the dependency deadline for this call.
	pub fn with_deadline(mut self, deadline: Duration) -> Self {
		self.deadline = Some(deadline);

		self
	}
}
impl Debug for LoginRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginRequest")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.field("client_ip", &self.client_ip)
			.field("deadline", &self.deadline)
			.finish()
	}
}

/// Rotation request carrying the presented refresh token.
#[derive(Clone, Debug)]
pub struct RefreshRequest {
	/// Refresh token to redeem.
	pub refresh_token: TokenSecret,
	/// `Origin` header of the calling browser context, if any.
	pub origin: Option<String>,
	/// Per-call deadline for each dependency call.
	pub deadline: Option<Duration>,
}
impl RefreshRequest {
	/// Creates a refresh request without an origin.
	pub fn new(refresh_token: impl Into<TokenSecret>) -> Self {
		Self { refresh_token: refresh_token.into(), origin: None, deadline: None }
	}

	/// Attaches the request origin.
	pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
		self.origin = Some(origin.into());

		self
	}

	/// Overrides the dependency deadline for this call.
	pub fn with_deadline(mut self, deadline: Duration) -> Self {
		self.deadline = Some(deadline);

		self
	}
}

/// Logout request carrying the refresh token to invalidate.
#[derive(Clone, Debug)]
pub struct LogoutRequest {
	/// Refresh token to invalidate.
	pub refresh_token: TokenSecret,
	/// Per-call deadline for each dependency call.
	pub deadline: Option<Duration>,
}
impl LogoutRequest {
	/// Creates a logout request.
	pub fn new(refresh_token: impl Into<TokenSecret>) -> Self {
		Self { refresh_token: refresh_token.into(), deadline: None }
	}

	/// Overrides the dependency deadline for this call.
	pub fn with_deadline(mut self, deadline: Duration) -> Self {
		self.deadline = Some(deadline);

		self
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn login_request_debug_redacts_password() {
		let request = LoginRequest::new("a@b.test", "hunter2", IpAddr::from([127, 0, 0, 1]))
			.with_deadline(Duration::seconds(1));
		let rendered = format!("{request:?}");

		assert!(!rendered.contains("hunter2"));
		assert!(rendered.contains("a@b.test"));
	}

	#[test]
	fn refresh_request_debug_redacts_token() {
		let request = RefreshRequest::new("opaque").with_origin("https://app.example");

		assert!(!format!("{request:?}").contains("opaque"));
	}
}
