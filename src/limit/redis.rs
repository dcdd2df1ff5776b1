//! Redis-backed fixed-window [`RateLimiter`] shared by every service instance (enable the
//! `redis` feature).

// crates.io
use ::redis::{Script, aio::ConnectionManager};
// self
use crate::{
	_prelude::*,
	limit::{LimitFuture, LimiterError, RateLimitDecision, RateLimitKey, RateLimitRule, RateLimiter},
};

// INCR, arm EXPIRE on the first hit or when the key lost its TTL, then report the TTL,
// all in one server-side step.
const FIXED_WINDOW: &str = r#"
local current = redis.call('INCR', KEYS[1])
local window = tonumber(ARGV[1])
local ttl = redis.call('TTL', KEYS[1])

if current == 1 or ttl < 0 then
	redis.call('EXPIRE', KEYS[1], window)
	ttl = window
end

return {current, ttl}
"#;

/// Fixed-window counters in Redis.
#[derive(Clone)]
pub struct RedisRateLimiter {
	conn: ConnectionManager,
	key_prefix: String,
	script: Arc<Script>,
}
impl RedisRateLimiter {
	/// Creates a limiter on top of a managed connection.
	pub fn new(conn: ConnectionManager) -> Self {
		Self { conn, key_prefix: "ratelimit".into(), script: Arc::new(Script::new(FIXED_WINDOW)) }
	}

	/// Connects to `url` and wraps the resulting managed connection.
	pub async fn connect(url: &str) -> Result<Self, LimiterError> {
		let client = ::redis::Client::open(url).map_err(backend)?;
		let conn = ConnectionManager::new(client).await.map_err(backend)?;

		Ok(Self::new(conn))
	}

	/// Overrides the namespace prepended to every key.
	pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.key_prefix = prefix.into();

		self
	}

	fn backend_key(&self, key: &RateLimitKey) -> String {
		format!("{}:{}", self.key_prefix, key.as_str())
	}
}
impl RateLimiter for RedisRateLimiter {
	fn try_acquire<'a>(&'a self, key: &'a RateLimitKey, rule: RateLimitRule) -> LimitFuture<'a> {
		Box::pin(async move {
			let mut conn = self.conn.clone();
			let (count, ttl): (u64, i64) = self
				.script
				.key(self.backend_key(key))
				.arg(rule.window_secs)
				.invoke_async(&mut conn)
				.await
				.map_err(backend)?;
			let decision = RateLimitDecision::evaluate(count, rule.limit, Duration::seconds(ttl));

			tracing::debug!(
				key = %key,
				count,
				allowed = decision.is_allowed(),
				"Fixed window rate limit check."
			);

			Ok(decision)
		})
	}
}
impl Debug for RedisRateLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RedisRateLimiter").field("key_prefix", &self.key_prefix).finish()
	}
}

fn backend(e: ::redis::RedisError) -> LimiterError {
	LimiterError::Backend { message: e.to_string() }
}
