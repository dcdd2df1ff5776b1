//! `Set-Cookie` rendering for the refresh token.
//!
//! The refresh token travels in an `HttpOnly`, `SameSite=Strict`, path-scoped cookie;
//! `Secure` is set everywhere except development, and the expiry tracks the token's own.

// crates.io
use ::cookie::{Cookie, SameSite};
// self
use crate::{
	_prelude::*,
	auth::{IssuedSession, TokenSecret},
	config::Environment,
};

/// Default cookie name.
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";
/// Default cookie path; covers the refresh and logout endpoints.
pub const REFRESH_COOKIE_PATH: &str = "/auth";

/// Renders and reads the refresh token cookie.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshCookie {
	name: String,
	path: String,
	secure: bool,
}
impl RefreshCookie {
	/// Creates the cookie policy for `environment`.
	pub fn new(environment: Environment) -> Self {
		Self {
			name: REFRESH_COOKIE_NAME.into(),
			path: REFRESH_COOKIE_PATH.into(),
			secure: !environment.is_development(),
		}
	}

	/// Overrides the cookie name.
	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();

		self
	}

	/// Overrides the cookie path.
	pub fn with_path(mut self, path: impl Into<String>) -> Self {
		self.path = path.into();

		self
	}

	/// Cookie name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// `Set-Cookie` value carrying the refresh token of `session`.
	pub fn render(&self, session: &IssuedSession) -> String {
		self.render_at(&session.refresh_token, session.refresh_expires_at, OffsetDateTime::now_utc())
	}

	/// `Set-Cookie` value for `token` expiring at `expires_at`, as seen at `now`.
	pub fn render_at(
		&self,
		token: &TokenSecret,
		expires_at: OffsetDateTime,
		now: OffsetDateTime,
	) -> String {
		let max_age = (expires_at - now).max(Duration::ZERO);

		Cookie::build((self.name.as_str(), token.expose()))
			.http_only(true)
			.secure(self.secure)
			.same_site(SameSite::Strict)
			.path(self.path.as_str())
			.max_age(max_age)
			.expires(expires_at)
			.build()
			.to_string()
	}

	/// `Set-Cookie` value that removes the refresh token cookie.
	pub fn clear(&self) -> String {
		Cookie::build((self.name.as_str(), ""))
			.http_only(true)
			.secure(self.secure)
			.same_site(SameSite::Strict)
			.path(self.path.as_str())
			.max_age(Duration::ZERO)
			.expires(OffsetDateTime::UNIX_EPOCH)
			.build()
			.to_string()
	}

	/// Reads the refresh token out of a `Cookie` request header.
	pub fn extract(&self, header: &str) -> Option<TokenSecret> {
		Cookie::split_parse(header)
			.filter_map(|cookie| cookie.ok())
			.find(|cookie| cookie.name() == self.name && !cookie.value().is_empty())
			.map(|cookie| TokenSecret::new(cookie.value()))
	}
}
impl Default for RefreshCookie {
	fn default() -> Self {
		Self::new(Environment::Production)
	}
}
