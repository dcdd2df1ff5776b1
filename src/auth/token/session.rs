//! Access/refresh pair handed back to callers after login or rotation.

// self
use crate::{
	_prelude::*,
	auth::{AccessTokenId, Principal, token::secret::TokenSecret},
};

/// Token type advertised alongside access tokens.
pub const BEARER: &str = "Bearer";

/// Freshly issued access + refresh pair.
#[derive(Clone)]
pub struct IssuedSession {
	/// Signed access token.
	pub access_token: TokenSecret,
	/// `jti` of [`Self::access_token`].
	pub access_token_id: AccessTokenId,
	/// Access token lifetime.
	pub expires_in: Duration,
	/// Single-use refresh token.
	pub refresh_token: TokenSecret,
	/// Expiry of [`Self::refresh_token`].
	pub refresh_expires_at: OffsetDateTime,
	/// Principal the pair was issued for.
	pub principal: Principal,
}
impl IssuedSession {
	/// Token type for the `token_type` response field.
	pub fn token_type(&self) -> &'static str {
		BEARER
	}
}
impl Debug for IssuedSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IssuedSession")
			.field("access_token", &"<redacted>")
			.field("access_token_id", &self.access_token_id)
			.field("expires_in", &self.expires_in)
			.field("refresh_token", &"<redacted>")
			.field("refresh_expires_at", &self.refresh_expires_at)
			.field("principal", &self.principal.id)
			.finish()
	}
}
