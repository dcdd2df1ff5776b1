// self
use crate::{
	_prelude::*,
	audit::AuditLevel,
	limit::RateLimitKey,
	obs::{FlowKind, FlowOutcome, FlowSpan},
	session::{LogoutRequest, SessionManager, bounded},
};

impl SessionManager {
	/// Invalidates a refresh token. Idempotent: unknown and already terminal tokens succeed.
	///
	/// Shares the `refresh:token:<digest>` counter with refresh, under its own threshold.
	pub async fn logout(&self, request: LogoutRequest) -> Result<()> {
		const KIND: FlowKind = FlowKind::Logout;

		let span = FlowSpan::new(KIND, "logout");

		self.metrics.record(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.logout_inner(request)).await;

		self.metrics.record_result(KIND, &result);

		result
	}

	async fn logout_inner(&self, request: LogoutRequest) -> Result<()> {
		let deadline = self.deadline(request.deadline);
		let presented = request.refresh_token;
		let fingerprint = presented.fingerprint();

		if let Some(retry_after) = self
			.gate(
				&RateLimitKey::refresh_token(presented.expose()),
				self.config.rate_limits.logout,
				deadline,
			)
			.await?
		{
			self.audit.emit(
				self.audit
					.event(AuditLevel::Warning, "logout.rate_limited")
					.with("token_fingerprint", &fingerprint),
			);

			return Err(Error::RateLimited { retry_after });
		}

		let matched = bounded("store", deadline, self.store.invalidate(presented.expose())).await?;

		tracing::info!(matched, "Refresh token invalidated.");

		self.audit.emit(
			self.audit
				.event(AuditLevel::Info, "logout")
				.with("token_fingerprint", &fingerprint)
				.with("matched", matched),
		);

		Ok(())
	}
}
