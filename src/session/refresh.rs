// self
use crate::{
	_prelude::*,
	audit::AuditLevel,
	auth::IssuedSession,
	config::ReplayPolicy,
	limit::RateLimitKey,
	obs::{FlowKind, FlowOutcome, FlowSpan},
	session::{RefreshRequest, SessionManager, bounded},
	store::{ClaimOutcome, ClaimRejection},
};

impl SessionManager {
	/// Redeems a refresh token and rotates it into a new access/refresh pair.
	///
	/// Steps run in a fixed order: rate limit on the presented token, origin check, atomic
	/// claim, owner lookup, then issuance of the new pair. Once the claim succeeds the
	/// presented token stays consumed even if a later step fails; the caller has to log in
	/// again in that case. Every rejected claim, whatever the reason, surfaces as
	/// [`Error::InvalidRefreshToken`].
	pub async fn refresh(&self, request: RefreshRequest) -> Result<IssuedSession> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh");

		self.metrics.record(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.refresh_inner(request)).await;

		self.metrics.record_result(KIND, &result);

		result
	}

	async fn refresh_inner(&self, request: RefreshRequest) -> Result<IssuedSession> {
		let deadline = self.deadline(request.deadline);
		let presented = request.refresh_token;
		let fingerprint = presented.fingerprint();

		if let Some(retry_after) = self
			.gate(
				&RateLimitKey::refresh_token(presented.expose()),
				self.config.rate_limits.refresh,
				deadline,
			)
			.await?
		{
			self.audit.emit(
				self.audit
					.event(AuditLevel::Warning, "refresh.rate_limited")
					.with("token_fingerprint", &fingerprint),
			);

			return Err(Error::RateLimited { retry_after });
		}
		if !self.origins.allows(request.origin.as_deref()) {
			let origin = request.origin.as_deref().unwrap_or("<none>");

			tracing::warn!(origin, "Refresh rejected: origin is not allowed.");

			self.audit.emit(
				self.audit
					.event(AuditLevel::Warning, "refresh.failure")
					.with("reason", "origin_rejected")
					.with("origin", origin)
					.with("token_fingerprint", &fingerprint),
			);

			return Err(Error::OriginRejected);
		}

		let now = OffsetDateTime::now_utc();
		let claimed =
			match bounded("store", deadline, self.store.try_claim(presented.expose(), now)).await? {
				ClaimOutcome::Claimed(record) => record,
				ClaimOutcome::Rejected(rejection) => {
					self.reject_claim(&rejection, &fingerprint, deadline).await;

					return Err(Error::InvalidRefreshToken);
				},
			};
		let Some(principal) =
			bounded("directory", deadline, self.directory.get_by_id(&claimed.user_id)).await?
		else {
			tracing::warn!(user_id = %claimed.user_id, "Refresh rejected: owner no longer exists.");

			self.audit.emit(
				self.audit
					.event(AuditLevel::Warning, "refresh.failure")
					.with("reason", "user_missing")
					.with("user_id", &claimed.user_id),
			);

			return Err(Error::InvalidRefreshToken);
		};
		let session = self.mint(principal, deadline).await.inspect_err(|e| {
			tracing::error!(
				user_id = %claimed.user_id,
				error = %e,
				"Rotation failed after the claim; the presented token stays consumed."
			);
		})?;

		tracing::info!(user_id = %session.principal.id, "Refresh token rotated.");

		self.audit.emit(
			self.audit
				.event(AuditLevel::Info, "refresh.success")
				.with("user_id", &session.principal.id)
				.with("previous_token_id", claimed.id)
				.with("access_token_id", &session.access_token_id),
		);

		Ok(session)
	}

	async fn reject_claim(&self, rejection: &ClaimRejection, fingerprint: &str, deadline: Duration) {
		tracing::warn!(
			reason = %rejection.reason,
			token_fingerprint = fingerprint,
			"Refresh token rejected."
		);

		let mut event = self
			.audit
			.event(AuditLevel::Warning, "refresh.failure")
			.with("reason", rejection.reason)
			.with("token_fingerprint", fingerprint);

		if let Some(owner) = &rejection.owner {
			event = event.with("user_id", owner);
		}

		self.audit.emit(event);

		if !rejection.reason.is_replay() || self.config.replay_policy != ReplayPolicy::RevokeUser {
			return;
		}

		let Some(owner) = &rejection.owner else {
			return;
		};

		match bounded("store", deadline, self.store.invalidate_user(owner)).await {
			Ok(revoked) => {
				tracing::warn!(user_id = %owner, revoked, "Replay detected; owner's sessions revoked.");

				self.audit.emit(
					self.audit
						.event(AuditLevel::Warning, "refresh.replay_revoked")
						.with("user_id", owner)
						.with("revoked", revoked),
				);
			},
			Err(e) => {
				tracing::error!(user_id = %owner, error = %e, "Replay revocation failed.");
			},
		}
	}
}
