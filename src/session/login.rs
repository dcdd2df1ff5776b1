// self
use crate::{
	_prelude::*,
	audit::AuditLevel,
	auth::IssuedSession,
	limit::RateLimitKey,
	obs::{FlowKind, FlowOutcome, FlowSpan},
	session::{LoginRequest, SessionManager, bounded},
};

impl SessionManager {
	/// Authenticates an email/password pair and opens a new session.
	///
	/// The email is trimmed before it reaches the verifier; only the limiter key is
	/// case-folded. Both the per-email and the per-IP counters are incremented on every attempt; when
	/// either is over budget the call fails with [`Error::RateLimited`] carrying the larger
	/// retry delay, before the credentials are looked at.
	pub async fn login(&self, request: LoginRequest) -> Result<IssuedSession> {
		const KIND: FlowKind = FlowKind::Login;

		let span = FlowSpan::new(KIND, "login");

		self.metrics.record(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.login_inner(request)).await;

		self.metrics.record_result(KIND, &result);

		result
	}

	async fn login_inner(&self, request: LoginRequest) -> Result<IssuedSession> {
		let deadline = self.deadline(request.deadline);
		let rules = self.config.rate_limits;
		let email = request.email.trim();
		let by_email =
			self.gate(&RateLimitKey::login_email(email), rules.login_email, deadline).await?;
		let by_ip =
			self.gate(&RateLimitKey::login_ip(request.client_ip), rules.login_ip, deadline).await?;

		if let Some(retry_after) = by_email.max(by_ip) {
			self.audit.emit(
				self.audit
					.event(AuditLevel::Warning, "login.rate_limited")
					.with("email", email)
					.with("client_ip", request.client_ip),
			);

			return Err(Error::RateLimited { retry_after });
		}

		let Some(principal) = bounded(
			"directory",
			deadline,
			self.verifier.validate(email, request.password.expose()),
		)
		.await?
		else {
			tracing::info!(client_ip = %request.client_ip, "Login rejected: invalid credentials.");

			self.audit.emit(
				self.audit
					.event(AuditLevel::Warning, "login.failure")
					.with("email", email)
					.with("client_ip", request.client_ip),
			);

			return Err(Error::InvalidCredentials);
		};
		let session = self.mint(principal, deadline).await?;

		tracing::info!(user_id = %session.principal.id, "Login succeeded.");

		self.audit.emit(
			self.audit
				.event(AuditLevel::Info, "login.success")
				.with("user_id", &session.principal.id)
				.with("access_token_id", &session.access_token_id)
				.with("client_ip", request.client_ip),
		);

		Ok(session)
	}
}
