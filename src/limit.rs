//! Keyed, windowed attempt counters that gate login, refresh, and logout.
//!
//! A limiter increments the counter for a key and reports whether the attempt stays
//! within the rule. The first increment of a window arms the reset timer; the counter is
//! never reset by a later attempt, so a window always ends `rule.window` after its first
//! attempt. Keys are independent and share no locks.

pub mod memory;
#[cfg(feature = "redis")] pub mod redis;

pub use memory::MemoryRateLimiter;
#[cfg(feature = "redis")] pub use self::redis::RedisRateLimiter;

// self
use crate::{_prelude::*, auth::token::secret};

/// Boxed future returned by [`RateLimiter::try_acquire`].
pub type LimitFuture<'a> =
	Pin<Box<dyn Future<Output = Result<RateLimitDecision, LimiterError>> + 'a + Send>>;

/// Shared counter backend consulted before every session operation.
pub trait RateLimiter
where
	Self: Send + Sync,
{
	/// Counts one attempt for `key` and evaluates it against `rule`.
	fn try_acquire<'a>(&'a self, key: &'a RateLimitKey, rule: RateLimitRule) -> LimitFuture<'a>;
}

/// Error type produced by [`RateLimiter`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum LimiterError {
	/// Counter backend failure.
	#[error("Rate limiter backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Attempt budget for one limiter dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
	/// Attempts allowed per window.
	pub limit: u32,
	/// Window length in seconds.
	pub window_secs: u32,
}
impl RateLimitRule {
	/// Creates a rule allowing `limit` attempts per `window_secs`.
	pub const fn new(limit: u32, window_secs: u32) -> Self {
		Self { limit, window_secs }
	}

	/// Shorthand for a per-minute budget.
	pub const fn per_minute(limit: u32) -> Self {
		Self::new(limit, 60)
	}

	/// Window length as a [`Duration`].
	pub fn window(&self) -> Duration {
		Duration::seconds(i64::from(self.window_secs))
	}
}

/// Limiter dimension a key belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LimitDimension {
	/// Login attempts per normalized email.
	LoginEmail,
	/// Login attempts per client address.
	LoginIp,
	/// Refresh and logout attempts per presented refresh token.
	RefreshToken,
}
impl LimitDimension {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LimitDimension::LoginEmail => "login_email",
			LimitDimension::LoginIp => "login_ip",
			LimitDimension::RefreshToken => "refresh_token",
		}
	}
}
impl Display for LimitDimension {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Counter key such as `login:email:<email>` or `refresh:token:<digest>`.
///
/// Refresh-token keys carry the token's SHA-256 fingerprint, never the bearer value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
	dimension: LimitDimension,
	key: String,
}
impl RateLimitKey {
	/// Key for login attempts against `email` (trimmed, lower-cased).
	pub fn login_email(email: &str) -> Self {
		Self {
			dimension: LimitDimension::LoginEmail,
			key: format!("login:email:{}", email.trim().to_lowercase()),
		}
	}

	/// Key for login attempts from `ip`.
	pub fn login_ip(ip: IpAddr) -> Self {
		Self { dimension: LimitDimension::LoginIp, key: format!("login:ip:{ip}") }
	}

	/// Key for refresh/logout attempts presenting `token`.
	pub fn refresh_token(token: &str) -> Self {
		Self {
			dimension: LimitDimension::RefreshToken,
			key: format!("refresh:token:{}", secret::fingerprint(token)),
		}
	}

	/// Dimension of the key.
	pub fn dimension(&self) -> LimitDimension {
		self.dimension
	}

	/// Backend key string.
	pub fn as_str(&self) -> &str {
		&self.key
	}
}
impl Display for RateLimitKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.key)
	}
}

/// Result emitted by a [`RateLimiter`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// The attempt is within budget.
	Allow {
		/// Attempts counted in the current window, including this one.
		count: u64,
	},
	/// The attempt exceeded the budget.
	Deny(RetryDirective),
}
impl RateLimitDecision {
	/// Returns `true` when the attempt may proceed.
	pub fn is_allowed(&self) -> bool {
		matches!(self, Self::Allow { .. })
	}

	/// Builds the decision for `count` attempts against `limit` with `ttl` left in the
	/// window.
	pub fn evaluate(count: u64, limit: u32, ttl: Duration) -> Self {
		if count > u64::from(limit) {
			Self::Deny(RetryDirective::new(count, ttl))
		} else {
			Self::Allow { count }
		}
	}
}

/// Advises callers when to retry after a [`RateLimitDecision::Deny`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Attempts counted in the current window.
	pub count: u64,
	/// Time until the window resets, rounded up to whole seconds and at least one.
	pub retry_after: Duration,
}
impl RetryDirective {
	/// Creates a directive from the remaining window time.
	pub fn new(count: u64, remaining: Duration) -> Self {
		Self { count, retry_after: ceil_seconds(remaining) }
	}

	/// Retry delay in whole seconds (the `Retry-After` header value).
	pub fn retry_after_secs(&self) -> i64 {
		self.retry_after.whole_seconds()
	}
}

fn ceil_seconds(remaining: Duration) -> Duration {
	let whole = remaining.whole_seconds();
	let rounded = if remaining > Duration::seconds(whole) { whole + 1 } else { whole };

	Duration::seconds(rounded.max(1))
}
