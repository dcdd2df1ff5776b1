//! Refresh-token rows, lifecycle helpers, and builders.

// self
use crate::{
	_prelude::*,
	auth::{AccessTokenId, UserId, token::secret::TokenSecret},
};

/// Client-visible lifecycle state of a refresh token.
///
/// `Redeemed`, `Invalidated`, and `Expired` are terminal. Expiry is evaluated lazily at
/// claim time; no sweep ever rewrites rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefreshTokenState {
	/// Token may be redeemed exactly once.
	Active,
	/// Token was already exchanged for a new pair.
	Redeemed,
	/// Token was invalidated by logout or by replay revocation.
	Invalidated,
	/// Token outlived its expiry instant without being redeemed.
	Expired,
}

/// Errors produced by [`RefreshTokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum RefreshTokenBuilderError {
	/// Issued when no token value was provided.
	#[error("Refresh token value is required.")]
	MissingToken,
	/// Issued when the paired access token id is missing.
	#[error("Access token id is required.")]
	MissingAccessTokenId,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
	/// Issued when the relative expiry overflows the timestamp range.
	#[error("Expiry is out of range.")]
	ExpiryOutOfRange,
	/// Issued when the expiry does not lie after the creation instant.
	#[error("Expiry must be later than the creation instant.")]
	ExpiryNotAfterCreation,
}

/// One issued refresh credential as persisted by a store.
///
/// Rows are never deleted by the session core; redeemed and invalidated rows remain as
/// the audit trail that makes replays detectable.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
	/// Store-assigned surrogate key.
	pub id: i64,
	/// Opaque bearer value; lookup key for every store operation.
	pub token: TokenSecret,
	/// `jti` of the access token issued alongside this refresh token.
	pub access_token_id: AccessTokenId,
	/// Owning principal.
	pub user_id: UserId,
	/// Creation instant.
	pub created_at: OffsetDateTime,
	/// Expiry instant (`created_at` plus the configured refresh lifetime).
	pub expires_at: OffsetDateTime,
	/// Set exactly once when the token is redeemed.
	pub used: bool,
	/// Set by logout; never cleared.
	pub invalidated: bool,
}
impl RefreshToken {
	/// Returns a builder for a new, not yet persisted row owned by `user_id`.
	pub fn builder(user_id: UserId) -> RefreshTokenBuilder {
		RefreshTokenBuilder::new(user_id)
	}

	/// Computes the lifecycle state at a given instant.
	pub fn state_at(&self, instant: OffsetDateTime) -> RefreshTokenState {
		if self.invalidated {
			return RefreshTokenState::Invalidated;
		}
		if self.used {
			return RefreshTokenState::Redeemed;
		}
		if instant >= self.expires_at {
			return RefreshTokenState::Expired;
		}

		RefreshTokenState::Active
	}

	/// Convenience helper that checks the state using the current UTC instant.
	pub fn state(&self) -> RefreshTokenState {
		self.state_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` iff the token is neither used, invalidated, nor expired at `instant`.
	pub fn is_redeemable_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.state_at(instant), RefreshTokenState::Active)
	}

	/// Remaining lifetime at `instant`, clamped at zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		(self.expires_at - instant).max(Duration::ZERO)
	}
}
impl Debug for RefreshToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshToken")
			.field("id", &self.id)
			.field("token", &"<redacted>")
			.field("access_token_id", &self.access_token_id)
			.field("user_id", &self.user_id)
			.field("created_at", &self.created_at)
			.field("expires_at", &self.expires_at)
			.field("used", &self.used)
			.field("invalidated", &self.invalidated)
			.finish()
	}
}

/// A refresh-token row that has not been assigned a store id yet.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRefreshToken {
	/// Opaque bearer value.
	pub token: TokenSecret,
	/// Paired access token id.
	pub access_token_id: AccessTokenId,
	/// Owning principal.
	pub user_id: UserId,
	/// Creation instant.
	pub created_at: OffsetDateTime,
	/// Expiry instant.
	pub expires_at: OffsetDateTime,
}
impl NewRefreshToken {
	/// Materializes the persisted row once the store assigned `id`.
	pub fn into_record(self, id: i64) -> RefreshToken {
		RefreshToken {
			id,
			token: self.token,
			access_token_id: self.access_token_id,
			user_id: self.user_id,
			created_at: self.created_at,
			expires_at: self.expires_at,
			used: false,
			invalidated: false,
		}
	}

	/// Returns a copy carrying a different token value (used after a value collision).
	pub fn with_token(mut self, token: impl Into<String>) -> Self {
		self.token = TokenSecret::new(token);

		self
	}
}
impl Debug for NewRefreshToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("NewRefreshToken")
			.field("token", &"<redacted>")
			.field("access_token_id", &self.access_token_id)
			.field("user_id", &self.user_id)
			.field("created_at", &self.created_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`NewRefreshToken`].
#[derive(Clone, Debug)]
pub struct RefreshTokenBuilder {
	user_id: UserId,
	token: Option<TokenSecret>,
	access_token_id: Option<AccessTokenId>,
	created_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl RefreshTokenBuilder {
	fn new(user_id: UserId) -> Self {
		Self {
			user_id,
			token: None,
			access_token_id: None,
			created_at: None,
			expires_at: None,
			expires_in: None,
		}
	}

	/// Provides the opaque token value.
	pub fn token(mut self, token: impl Into<String>) -> Self {
		self.token = Some(TokenSecret::new(token));

		self
	}

	/// Links the row to the access token issued alongside it.
	pub fn access_token_id(mut self, id: AccessTokenId) -> Self {
		self.access_token_id = Some(id);

		self
	}

	/// Sets the creation instant.
	pub fn created_at(mut self, instant: OffsetDateTime) -> Self {
		self.created_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the creation instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Consumes the builder and produces a [`NewRefreshToken`].
	pub fn build(self) -> Result<NewRefreshToken, RefreshTokenBuilderError> {
		let token = self
			.token
			.filter(|token| !token.is_empty())
			.ok_or(RefreshTokenBuilderError::MissingToken)?;
		let access_token_id =
			self.access_token_id.ok_or(RefreshTokenBuilderError::MissingAccessTokenId)?;
		let created_at = self.created_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) =>
				created_at.checked_add(delta).ok_or(RefreshTokenBuilderError::ExpiryOutOfRange)?,
			(None, None) => return Err(RefreshTokenBuilderError::MissingExpiry),
		};

		if expires_at <= created_at {
			return Err(RefreshTokenBuilderError::ExpiryNotAfterCreation);
		}

		Ok(NewRefreshToken { token, access_token_id, user_id: self.user_id, created_at, expires_at })
	}
}
