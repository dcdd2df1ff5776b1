//! Session-level error types shared across flows, stores, and limiters.

// self
use crate::{_prelude::*, directory::DirectoryError, limit::LimiterError, store::StoreError};

/// Session-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical session error exposed by public APIs.
///
/// Callers only ever see the variants below; the reason a refresh token was rejected
/// (unknown, redeemed, invalidated, expired) is logged and audited but never surfaced.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Too many attempts for one of the limiter dimensions; retriable after the delay.
	#[error("Too many attempts; retry after {} seconds.", retry_after.whole_seconds())]
	RateLimited {
		/// Remaining time until the offending window resets.
		retry_after: Duration,
	},
	/// Email/password pair was rejected. Never reveals whether the account exists.
	#[error("Invalid email or password.")]
	InvalidCredentials,
	/// Refresh token is unknown, already redeemed, invalidated, or expired.
	#[error("Invalid refresh token.")]
	InvalidRefreshToken,
	/// Access token failed signature, issuer, audience, or expiry validation.
	#[error("Invalid access token: {reason}.")]
	InvalidAccessToken {
		/// Validation failure summary.
		reason: String,
	},
	/// Request origin is not part of the configured allow-list.
	#[error("Request origin is not allowed.")]
	OriginRejected,
	/// A shared dependency (store, limiter, directory) failed or timed out; nothing was assumed to
	/// succeed.
	#[error(transparent)]
	DependencyUnavailable(#[from] DependencyError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Access token could not be signed.
	#[error(transparent)]
	Issuer(#[from] crate::issuer::IssuerError),
}
impl Error {
	/// HTTP status a transport layer should answer with.
	pub fn http_status(&self) -> u16 {
		match self {
			Self::RateLimited { .. } => 429,
			Self::InvalidCredentials
			| Self::InvalidRefreshToken
			| Self::InvalidAccessToken { .. } => 401,
			Self::OriginRejected => 403,
			Self::DependencyUnavailable(_) => 503,
			Self::Config(_) | Self::Issuer(_) => 500,
		}
	}

	/// Retry-After hint for rate-limited outcomes.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::RateLimited { retry_after } => Some(*retry_after),
			_ => None,
		}
	}

	/// Returns `true` when the caller may retry the same request later.
	pub fn is_retriable(&self) -> bool {
		matches!(self, Self::RateLimited { .. } | Self::DependencyUnavailable(_))
	}
}
impl From<StoreError> for Error {
	fn from(e: StoreError) -> Self {
		Self::DependencyUnavailable(e.into())
	}
}
impl From<LimiterError> for Error {
	fn from(e: LimiterError) -> Self {
		Self::DependencyUnavailable(e.into())
	}
}
impl From<DirectoryError> for Error {
	fn from(e: DirectoryError) -> Self {
		Self::DependencyUnavailable(e.into())
	}
}

/// Failures of shared backends the session core depends on.
#[derive(Debug, ThisError)]
pub enum DependencyError {
	/// Refresh token store failure.
	#[error("{0}")]
	Store(
		#[from]
		#[source]
		StoreError,
	),
	/// Rate limiter backend failure.
	#[error("{0}")]
	Limiter(
		#[from]
		#[source]
		LimiterError,
	),
	/// Credential verifier or user directory failure.
	#[error("{0}")]
	Directory(
		#[from]
		#[source]
		DirectoryError,
	),
	/// The call exceeded its deadline and was treated as failed.
	#[error("The {dependency} call exceeded its {}ms deadline.", timeout.whole_milliseconds())]
	Timeout {
		/// Dependency label (`store`, `limiter`, `directory`).
		dependency: &'static str,
		/// Deadline that elapsed.
		timeout: Duration,
	},
}

/// Configuration and validation failures raised at startup.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Signing secret is shorter than the enforced minimum.
	#[error("Signing secret must be at least {min} bytes, got {actual}.")]
	SecretTooShort {
		/// Minimum accepted length in bytes.
		min: usize,
		/// Length that was supplied.
		actual: usize,
	},
	/// A required string setting is empty.
	#[error("The `{field}` setting cannot be empty.")]
	Empty {
		/// Setting name.
		field: &'static str,
	},
	/// A lifetime, window, or timeout is zero or negative.
	#[error("The `{field}` setting must be positive.")]
	NonPositive {
		/// Setting name.
		field: &'static str,
	},
	/// A lifetime exceeds its accepted maximum.
	#[error("The `{field}` setting must not exceed {max}.")]
	OutOfRange {
		/// Setting name.
		field: &'static str,
		/// Largest accepted value.
		max: u32,
	},
	/// A rate-limit rule allows zero attempts.
	#[error("The `{dimension}` rate limit must allow at least one attempt.")]
	ZeroLimit {
		/// Limiter dimension.
		dimension: &'static str,
	},
	/// Allow-listed origin cannot be parsed.
	#[error("Allowed origin `{origin}` is invalid.")]
	InvalidOrigin {
		/// Origin string as configured.
		origin: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Allow-listed origin has no tuple origin (e.g. `data:` or `file:` URLs).
	#[error("Allowed origin `{origin}` has no scheme/host/port tuple.")]
	OpaqueOrigin {
		/// Origin string as configured.
		origin: String,
	},
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;

	#[test]
	fn store_error_converts_into_dependency_error_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::DependencyUnavailable(DependencyError::Store(_))));
		assert!(error.to_string().contains("database unreachable"));

		let source = StdError::source(&error)
			.expect("Dependency error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
		assert_eq!(error.http_status(), 503);
		assert!(error.is_retriable());
	}

	#[test]
	fn rate_limited_exposes_retry_after() {
		let error = Error::RateLimited { retry_after: Duration::seconds(42) };

		assert_eq!(error.retry_after(), Some(Duration::seconds(42)));
		assert_eq!(error.http_status(), 429);
		assert!(error.to_string().contains("42 seconds"));
	}

	#[test]
	fn terminal_errors_do_not_leak_reasons() {
		assert_eq!(Error::InvalidCredentials.to_string(), "Invalid email or password.");
		assert_eq!(Error::InvalidRefreshToken.to_string(), "Invalid refresh token.");
		assert!(!Error::InvalidRefreshToken.is_retriable());
		assert_eq!(Error::OriginRejected.http_status(), 403);
	}
}
