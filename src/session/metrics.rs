//! Per-flow attempt/success/failure counters kept in-process.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	obs::{self, FlowKind, FlowOutcome},
};

/// Thread-safe counters for one flow.
#[derive(Debug, Default)]
pub struct FlowCounters {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	rate_limited: AtomicU64,
}
impl FlowCounters {
	/// Returns the total number of attempts.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of successful calls.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed calls, rate-limited ones excluded.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of calls rejected by a rate limiter.
	pub fn rate_limited(&self) -> u64 {
		self.rate_limited.load(Ordering::Relaxed)
	}

	fn counter(&self, outcome: FlowOutcome) -> &AtomicU64 {
		match outcome {
			FlowOutcome::Attempt => &self.attempts,
			FlowOutcome::Success => &self.success,
			FlowOutcome::Failure => &self.failure,
			FlowOutcome::RateLimited => &self.rate_limited,
		}
	}
}

/// Per-flow counters shared by every clone of a session manager.
#[derive(Debug, Default)]
pub struct SessionMetrics {
	login: FlowCounters,
	refresh: FlowCounters,
	logout: FlowCounters,
}
impl SessionMetrics {
	/// Counters for `kind`.
	pub fn flow(&self, kind: FlowKind) -> &FlowCounters {
		match kind {
			FlowKind::Login => &self.login,
			FlowKind::Refresh => &self.refresh,
			FlowKind::Logout => &self.logout,
		}
	}

	pub(crate) fn record(&self, kind: FlowKind, outcome: FlowOutcome) {
		self.flow(kind).counter(outcome).fetch_add(1, Ordering::Relaxed);

		obs::record_flow_outcome(kind, outcome);
	}

	pub(crate) fn record_result<T>(&self, kind: FlowKind, result: &Result<T>) {
		let outcome = match result {
			Ok(_) => FlowOutcome::Success,
			Err(Error::RateLimited { .. }) => FlowOutcome::RateLimited,
			Err(_) => FlowOutcome::Failure,
		};

		self.record(kind, outcome);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn outcomes_land_in_their_flow() {
		let metrics = SessionMetrics::default();

		metrics.record(FlowKind::Login, FlowOutcome::Attempt);
		metrics.record_result::<()>(
			FlowKind::Login,
			&Err(Error::RateLimited { retry_after: Duration::seconds(1) }),
		);
		metrics.record_result(FlowKind::Refresh, &Ok(()));

		assert_eq!(metrics.flow(FlowKind::Login).attempts(), 1);
		assert_eq!(metrics.flow(FlowKind::Login).rate_limited(), 1);
		assert_eq!(metrics.flow(FlowKind::Login).failures(), 0);
		assert_eq!(metrics.flow(FlowKind::Refresh).successes(), 1);
		assert_eq!(metrics.flow(FlowKind::Logout).attempts(), 0);
	}
}
