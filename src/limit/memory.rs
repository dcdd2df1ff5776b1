//! In-process fixed-window [`RateLimiter`] for single-instance deployments and tests.

// self
use crate::{
	_prelude::*,
	limit::{LimitFuture, RateLimitDecision, RateLimitKey, RateLimitRule, RateLimiter},
};

const SWEEP_THRESHOLD: usize = 4_096;
const SWEEP_INTERVAL: Duration = Duration::seconds(30);

#[derive(Clone, Copy, Debug)]
struct Window {
	count: u64,
	reset_at: OffsetDateTime,
}

#[derive(Debug, Default)]
struct Windows {
	by_key: HashMap<String, Window>,
	next_sweep: Option<OffsetDateTime>,
}

/// Fixed-window counters kept in a process-local map.
///
/// Increment and window arming happen inside one short critical section, which makes
/// the "first increment sets the TTL" step race-free. Once the map grows past a
/// threshold, expired windows are swept at most once per sweep interval.
#[derive(Clone, Debug, Default)]
pub struct MemoryRateLimiter(Arc<Mutex<Windows>>);
impl MemoryRateLimiter {
	/// Counts one attempt for `key` at `now`.
	pub fn try_acquire_at(
		&self,
		key: &RateLimitKey,
		rule: RateLimitRule,
		now: OffsetDateTime,
	) -> RateLimitDecision {
		let mut windows = self.0.lock();

		if windows.by_key.len() >= SWEEP_THRESHOLD
			&& windows.next_sweep.is_none_or(|next_sweep| now >= next_sweep)
		{
			windows.by_key.retain(|_, window| window.reset_at > now);
			windows.next_sweep = Some(now + SWEEP_INTERVAL);
		}

		let window = windows
			.by_key
			.entry(key.as_str().to_owned())
			.or_insert(Window { count: 0, reset_at: now });

		if now >= window.reset_at {
			window.count = 0;
		}

		window.count += 1;

		if window.count == 1 {
			window.reset_at = now + rule.window();
		}

		RateLimitDecision::evaluate(window.count, rule.limit, window.reset_at - now)
	}

	/// Attempts counted for `key` in the window active at `now`.
	pub fn count_at(&self, key: &RateLimitKey, now: OffsetDateTime) -> u64 {
		self.0
			.lock()
			.by_key
			.get(key.as_str())
			.filter(|window| window.reset_at > now)
			.map_or(0, |window| window.count)
	}

	/// Drops every window that has ended by `now`.
	pub fn purge_expired(&self, now: OffsetDateTime) {
		self.0.lock().by_key.retain(|_, window| window.reset_at > now);
	}
}
impl RateLimiter for MemoryRateLimiter {
	fn try_acquire<'a>(&'a self, key: &'a RateLimitKey, rule: RateLimitRule) -> LimitFuture<'a> {
		Box::pin(async move { Ok(self.try_acquire_at(key, rule, OffsetDateTime::now_utc())) })
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn window_allows_limit_then_denies_then_resets() {
		let limiter = MemoryRateLimiter::default();
		let key = RateLimitKey::login_email("u1@example.com");
		let rule = RateLimitRule::per_minute(3);
		let start = macros::datetime!(2025-01-01 00:00:00 UTC);

		for offset in 0..3 {
			assert!(
				limiter.try_acquire_at(&key, rule, start + Duration::seconds(offset)).is_allowed(),
				"Attempt {offset} should be within budget."
			);
		}

		let RateLimitDecision::Deny(directive) =
			limiter.try_acquire_at(&key, rule, start + Duration::seconds(20))
		else {
			panic!("Attempt above the limit must be denied.");
		};

		assert_eq!(directive.retry_after_secs(), 40);
		assert_eq!(directive.count, 4);

		let after = start + Duration::seconds(60);

		assert_eq!(limiter.try_acquire_at(&key, rule, after), RateLimitDecision::Allow { count: 1 });
		assert_eq!(limiter.count_at(&key, after), 1);
	}

	#[test]
	fn denied_attempts_do_not_extend_the_window() {
		let limiter = MemoryRateLimiter::default();
		let key = RateLimitKey::refresh_token("value");
		let rule = RateLimitRule::new(1, 10);
		let start = macros::datetime!(2025-01-01 00:00:00 UTC);

		limiter.try_acquire_at(&key, rule, start);

		for offset in 1..10 {
			assert!(!limiter.try_acquire_at(&key, rule, start + Duration::seconds(offset)).is_allowed());
		}

		assert!(limiter.try_acquire_at(&key, rule, start + Duration::seconds(10)).is_allowed());
	}

	#[test]
	fn keys_are_independent_and_purgeable() {
		let limiter = MemoryRateLimiter::default();
		let rule = RateLimitRule::per_minute(1);
		let now = macros::datetime!(2025-01-01 00:00:00 UTC);
		let a = RateLimitKey::login_email("a@example.com");
		let b = RateLimitKey::login_email("b@example.com");

		assert!(limiter.try_acquire_at(&a, rule, now).is_allowed());
		assert!(limiter.try_acquire_at(&b, rule, now).is_allowed());
		assert!(!limiter.try_acquire_at(&a, rule, now).is_allowed());

		limiter.purge_expired(now + Duration::minutes(2));

		assert_eq!(limiter.count_at(&a, now), 0);
	}

	#[test]
	fn expired_windows_are_swept_at_most_once_per_interval() {
		let limiter = MemoryRateLimiter::default();
		let rule = RateLimitRule::new(5, 1);
		let start = macros::datetime!(2025-01-01 00:00:00 UTC);
		let fill = |prefix: &str, now: OffsetDateTime| {
			for i in 0..SWEEP_THRESHOLD {
				limiter.try_acquire_at(
					&RateLimitKey::login_email(&format!("{prefix}-{i}@example.com")),
					rule,
					now,
				);
			}
		};
		let tracked = || limiter.0.lock().by_key.len();
		let sentinel = RateLimitKey::login_ip("203.0.113.7".parse().expect("IP fixture should parse."));

		fill("first", start);

		assert_eq!(tracked(), SWEEP_THRESHOLD);

		let swept_at = start + Duration::seconds(2);

		limiter.try_acquire_at(&sentinel, rule, swept_at);

		assert_eq!(tracked(), 1, "Expired windows should be swept once over the threshold.");

		fill("second", swept_at);
		limiter.try_acquire_at(&sentinel, rule, swept_at + Duration::seconds(5));

		assert_eq!(tracked(), SWEEP_THRESHOLD + 1, "No sweep may run inside the interval.");

		limiter.try_acquire_at(&sentinel, rule, swept_at + SWEEP_INTERVAL);

		assert_eq!(tracked(), 1);
	}
}
