//! Storage contracts and built-in store implementations for refresh-token rows.
//!
//! The contract deliberately has no `find` operation: every state change goes through
//! [`RefreshTokenStore::try_claim`] or [`RefreshTokenStore::invalidate`], each of which
//! is a single atomic step in the backend, so no call site can reintroduce a
//! read-then-write race.

pub mod file;
pub mod memory;
#[cfg(feature = "postgres")] pub mod postgres;

pub use file::FileStore;
pub use memory::MemoryStore;
#[cfg(feature = "postgres")] pub use postgres::PostgresStore;

// self
use crate::{
	_prelude::*,
	auth::{NewRefreshToken, RefreshToken, RefreshTokenState, UserId},
};

/// Boxed future returned by every [`RefreshTokenStore`] operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Durable refresh-token table shared by every service instance.
pub trait RefreshTokenStore
where
	Self: Send + Sync,
{
	/// Persists a new row and returns it with its store-assigned id.
	///
	/// Fails with [`StoreError::Conflict`] only when the token value already exists.
	fn insert(&self, token: NewRefreshToken) -> StoreFuture<'_, RefreshToken>;

	/// Atomically redeems `token` if it is redeemable at `now`.
	///
	/// On success the row is marked used and the pre-mutation record is returned. Any
	/// other state yields [`ClaimOutcome::Rejected`] without mutating anything. Of N
	/// concurrent claims for the same value, exactly one observes `Claimed`.
	fn try_claim<'a>(&'a self, token: &'a str, now: OffsetDateTime)
	-> StoreFuture<'a, ClaimOutcome>;

	/// Marks `token` invalidated. Idempotent: unknown or terminal tokens are not errors.
	///
	/// Resolves to `true` when a row matched the value.
	fn invalidate<'a>(&'a self, token: &'a str) -> StoreFuture<'a, bool>;

	/// Invalidates every row owned by `user_id` that is not invalidated yet.
	///
	/// Resolves to the number of rows changed.
	fn invalidate_user<'a>(&'a self, user_id: &'a UserId) -> StoreFuture<'a, u64>;
}

/// Result of a [`RefreshTokenStore::try_claim`] attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
	/// The token was redeemable and is now marked used; carries the pre-mutation record.
	Claimed(RefreshToken),
	/// The token could not be redeemed; nothing was mutated.
	Rejected(ClaimRejection),
}

/// Diagnostic detail for a rejected claim. Never surfaced to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRejection {
	/// Why the claim failed.
	pub reason: RejectionReason,
	/// Owner of the row, when the row exists.
	pub owner: Option<UserId>,
}
impl ClaimRejection {
	/// Rejection for a value that matches no row.
	pub fn unknown() -> Self {
		Self { reason: RejectionReason::Unknown, owner: None }
	}

	/// Classifies an existing, non-redeemable row.
	pub fn for_record(record: &RefreshToken, now: OffsetDateTime) -> Self {
		let reason = match record.state_at(now) {
			RefreshTokenState::Invalidated => RejectionReason::Invalidated,
			RefreshTokenState::Redeemed => RejectionReason::Redeemed,
			RefreshTokenState::Expired => RejectionReason::Expired,
			// A concurrent claimant won between the conditional update and this read.
			RefreshTokenState::Active => RejectionReason::Redeemed,
		};

		Self { reason, owner: Some(record.user_id.clone()) }
	}
}

/// Why a refresh token could not be claimed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectionReason {
	/// No row carries the presented value.
	Unknown,
	/// The row was already redeemed.
	Redeemed,
	/// The row was invalidated.
	Invalidated,
	/// The row expired before being redeemed.
	Expired,
}
impl RejectionReason {
	/// Returns a stable label suitable for log and audit fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RejectionReason::Unknown => "unknown",
			RejectionReason::Redeemed => "redeemed",
			RejectionReason::Invalidated => "invalidated",
			RejectionReason::Expired => "expired",
		}
	}

	/// Returns `true` when a consumed token was presented again.
	pub const fn is_replay(self) -> bool {
		matches!(self, RejectionReason::Redeemed | RejectionReason::Invalidated)
	}
}
impl Display for RejectionReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Error type produced by [`RefreshTokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// The token value collides with an existing row.
	#[error("Refresh token value already exists.")]
	Conflict,
}

/// Check-and-mark step shared by the in-process backends; callers hold the write guard.
pub(crate) fn claim_in_place(slot: Option<&mut RefreshToken>, now: OffsetDateTime) -> ClaimOutcome {
	match slot {
		Some(record) if record.is_redeemable_at(now) => {
			let previous = record.clone();

			record.used = true;

			ClaimOutcome::Claimed(previous)
		},
		Some(record) => ClaimOutcome::Rejected(ClaimRejection::for_record(record, now)),
		None => ClaimOutcome::Rejected(ClaimRejection::unknown()),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::auth::AccessTokenId;

	fn record(expires_at: OffsetDateTime) -> RefreshToken {
		RefreshToken::builder(UserId::new("u-1").expect("User fixture should be valid."))
			.token("refresh-1")
			.access_token_id(AccessTokenId::new("jti-1").expect("Jti fixture should be valid."))
			.created_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_at(expires_at)
			.build()
			.expect("Refresh token fixture should build.")
			.into_record(1)
	}

	#[test]
	fn claim_in_place_marks_used_and_returns_previous_state() {
		let now = macros::datetime!(2025-01-02 00:00 UTC);
		let mut row = record(macros::datetime!(2025-01-08 00:00 UTC));
		let outcome = claim_in_place(Some(&mut row), now);

		match outcome {
			ClaimOutcome::Claimed(previous) => {
				assert!(!previous.used, "Claim must return the pre-mutation record.");
			},
			other => panic!("Expected a successful claim, got {other:?}."),
		}

		assert!(row.used);

		let replay = claim_in_place(Some(&mut row), now);

		assert_eq!(
			replay,
			ClaimOutcome::Rejected(ClaimRejection {
				reason: RejectionReason::Redeemed,
				owner: Some(row.user_id.clone()),
			})
		);
	}

	#[test]
	fn claim_in_place_rejects_expired_and_missing_rows() {
		let expires_at = macros::datetime!(2025-01-08 00:00 UTC);
		let mut row = record(expires_at);

		match claim_in_place(Some(&mut row), expires_at) {
			ClaimOutcome::Rejected(rejection) =>
				assert_eq!(rejection.reason, RejectionReason::Expired),
			other => panic!("Expired rows must never be claimable, got {other:?}."),
		}

		assert!(!row.used, "Rejected claims must not mutate the row.");
		assert_eq!(claim_in_place(None, expires_at), ClaimOutcome::Rejected(ClaimRejection::unknown()));
	}

	#[test]
	fn replay_reasons_are_flagged() {
		assert!(RejectionReason::Redeemed.is_replay());
		assert!(RejectionReason::Invalidated.is_replay());
		assert!(!RejectionReason::Expired.is_replay());
		assert!(!RejectionReason::Unknown.is_replay());
		assert_eq!(RejectionReason::Invalidated.to_string(), "invalidated");
	}
}
