//! Session manager orchestrating login, refresh-token rotation, and logout.
//!
//! The manager owns no token state of its own: every decision that must hold across
//! service instances is delegated to a single atomic step in a shared backend (a limiter
//! increment, a conditional claim, an unconditional invalidation). Each backend call is
//! bounded by a deadline and an elapsed deadline counts as a failure, so nothing is ever
//! assumed to have succeeded.

mod login;
mod logout;
mod refresh;

pub mod metrics;
pub mod origin;
pub mod request;

pub use self::{metrics::*, origin::*, request::*};

// self
use crate::{
	_prelude::*,
	audit::AuditEmitter,
	auth::{IssuedSession, Principal, RefreshToken},
	config::SessionConfig,
	directory::{CredentialVerifier, UserDirectory},
	error::{ConfigError, DependencyError},
	issuer::{AccessClaims, IssuerError, TokenIssuer},
	limit::{RateLimitDecision, RateLimitKey, RateLimitRule, RateLimiter},
	store::{RefreshTokenStore, StoreError},
};

const MAX_INSERT_ATTEMPTS: u32 = 3;

/// Coordinates the session flows against shared backends.
///
/// Cloning is cheap; clones share backends, metrics, and the audit queue.
#[derive(Clone)]
pub struct SessionManager {
	/// Refresh token table.
	pub store: Arc<dyn RefreshTokenStore>,
	/// Attempt counters gating every flow.
	pub limiter: Arc<dyn RateLimiter>,
	/// Email/password verification.
	pub verifier: Arc<dyn CredentialVerifier>,
	/// Principal lookup during rotation.
	pub directory: Arc<dyn UserDirectory>,
	/// In-process flow counters.
	pub metrics: Arc<SessionMetrics>,
	issuer: TokenIssuer,
	config: Arc<SessionConfig>,
	origins: OriginPolicy,
	audit: AuditEmitter,
}
impl SessionManager {
	/// Validates `config` and wires the manager to its backends.
	pub fn new(
		config: SessionConfig,
		store: Arc<dyn RefreshTokenStore>,
		limiter: Arc<dyn RateLimiter>,
		verifier: Arc<dyn CredentialVerifier>,
		directory: Arc<dyn UserDirectory>,
		audit: AuditEmitter,
	) -> Result<Self, ConfigError> {
		config.validate()?;

		let issuer = TokenIssuer::new(&config.jwt)?;
		let origins = OriginPolicy::from_config(&config)?;

		Ok(Self {
			store,
			limiter,
			verifier,
			directory,
			metrics: Default::default(),
			issuer,
			config: Arc::new(config),
			origins,
			audit,
		})
	}

	/// Active configuration.
	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	/// Token issuer built from the configuration.
	pub fn issuer(&self) -> &TokenIssuer {
		&self.issuer
	}

	/// Audit handle used by the flows.
	pub fn audit(&self) -> &AuditEmitter {
		&self.audit
	}

	/// Validates an access token minted by this manager's issuer.
	pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims> {
		self.issuer.validate_access_token(token)
	}

	fn deadline(&self, requested: Option<Duration>) -> Duration {
		requested
			.filter(|deadline| deadline.is_positive())
			.unwrap_or_else(|| self.config.store_timeout())
	}

	/// Counts one attempt; resolves to the retry delay when the attempt is denied.
	async fn gate(
		&self,
		key: &RateLimitKey,
		rule: RateLimitRule,
		deadline: Duration,
	) -> Result<Option<Duration>> {
		match bounded("limiter", deadline, self.limiter.try_acquire(key, rule)).await? {
			RateLimitDecision::Allow { .. } => Ok(None),
			RateLimitDecision::Deny(directive) => {
				tracing::warn!(
					dimension = %key.dimension(),
					count = directive.count,
					retry_after_secs = directive.retry_after_secs(),
					"Rate limit exceeded."
				);

				Ok(Some(directive.retry_after))
			},
		}
	}

	/// Issues an access/refresh pair for `principal` and persists the refresh row.
	async fn mint(&self, principal: Principal, deadline: Duration) -> Result<IssuedSession> {
		let access = self.issuer.issue_access_token(&principal)?;
		let mut attempt = 1;
		let record = loop {
			let row = RefreshToken::builder(principal.id.clone())
				.token(self.issuer.issue_refresh_token_value().expose())
				.access_token_id(access.jti.clone())
				.created_at(access.issued_at)
				.expires_in(self.issuer.refresh_lifetime())
				.build()
				.map_err(IssuerError::from)?;

			match bounded("store", deadline, self.store.insert(row)).await {
				Err(Error::DependencyUnavailable(DependencyError::Store(StoreError::Conflict)))
					if attempt < MAX_INSERT_ATTEMPTS =>
				{
					tracing::warn!(attempt, "Refresh token value collided; regenerating.");

					attempt += 1;
				},
				result => break result?,
			}
		};

		Ok(IssuedSession {
			access_token: access.token,
			access_token_id: access.jti,
			expires_in: self.issuer.access_lifetime(),
			refresh_token: record.token,
			refresh_expires_at: record.expires_at,
			principal,
		})
	}
}
impl Debug for SessionManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionManager")
			.field("issuer", &self.issuer)
			.field("environment", &self.config.environment)
			.field("origins", &self.origins)
			.field("replay_policy", &self.config.replay_policy)
			.finish()
	}
}

/// Runs `fut` under `deadline`; an elapsed deadline becomes [`DependencyError::Timeout`].
async fn bounded<T, E, F>(dependency: &'static str, deadline: Duration, fut: F) -> Result<T>
where
	F: Future<Output = Result<T, E>>,
	Error: From<E>,
{
	match tokio::time::timeout(deadline.unsigned_abs(), fut).await {
		Ok(result) => result.map_err(Error::from),
		Err(_) => {
			tracing::warn!(dependency, deadline = %deadline, "Dependency call timed out.");

			Err(DependencyError::Timeout { dependency, timeout: deadline }.into())
		},
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		audit::MemoryAuditSink,
		auth::{NewRefreshToken, UserId},
		config::{AuditConfig, JwtConfig},
		directory::MemoryDirectory,
		limit::MemoryRateLimiter,
		store::{ClaimOutcome, MemoryStore, StoreFuture},
	};

	struct StallingStore;
	impl RefreshTokenStore for StallingStore {
		fn insert(&self, _: NewRefreshToken) -> StoreFuture<'_, RefreshToken> {
			Box::pin(std::future::pending())
		}

		fn try_claim<'a>(&'a self, _: &'a str, _: OffsetDateTime) -> StoreFuture<'a, ClaimOutcome> {
			Box::pin(std::future::pending())
		}

		fn invalidate<'a>(&'a self, _: &'a str) -> StoreFuture<'a, bool> {
			Box::pin(std::future::pending())
		}

		fn invalidate_user<'a>(&'a self, _: &'a UserId) -> StoreFuture<'a, u64> {
			Box::pin(std::future::pending())
		}
	}

	fn manager(store: Arc<dyn RefreshTokenStore>) -> SessionManager {
		let config = SessionConfig::new(JwtConfig::new(
			"0123456789abcdef0123456789abcdef",
			"session-broker",
			"api",
		))
		.with_store_timeout_ms(100);
		let audit = AuditEmitter::spawn(Arc::new(MemoryAuditSink::default()), &AuditConfig::default());

		SessionManager::new(
			config,
			store,
			Arc::new(MemoryRateLimiter::default()),
			Arc::new(MemoryDirectory::default()),
			Arc::new(MemoryDirectory::default()),
			audit,
		)
		.expect("Manager fixture should be valid.")
	}

	fn principal() -> Principal {
		Principal::new(UserId::new("user-1").expect("User fixture should be valid."), "a@b.test")
	}

	#[tokio::test]
	async fn mint_persists_the_refresh_row() {
		let store = MemoryStore::default();
		let manager = manager(Arc::new(store.clone()));
		let session = manager
			.mint(principal(), Duration::seconds(1))
			.await
			.expect("Minting against the memory store should succeed.");
		let rows = store.rows_for(&session.principal.id);

		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0].token, session.refresh_token);
		assert_eq!(rows[0].access_token_id, session.access_token_id);
		assert_eq!(session.expires_in, Duration::minutes(15));
		assert_eq!(session.token_type(), "Bearer");
	}

	#[tokio::test(start_paused = true)]
	async fn stalled_store_surfaces_as_timeout() {
		let manager = manager(Arc::new(StallingStore));
		let err = manager
			.mint(principal(), Duration::milliseconds(50))
			.await
			.expect_err("A stalled store must not be treated as success.");

		assert!(matches!(
			err,
			Error::DependencyUnavailable(DependencyError::Timeout { dependency: "store", .. })
		));
		assert_eq!(err.http_status(), 503);
	}

	#[tokio::test]
	async fn requested_deadline_overrides_default() {
		let manager = manager(Arc::new(MemoryStore::default()));

		assert_eq!(manager.deadline(None), Duration::milliseconds(100));
		assert_eq!(manager.deadline(Some(Duration::seconds(2))), Duration::seconds(2));
		assert_eq!(manager.deadline(Some(Duration::ZERO)), Duration::milliseconds(100));
	}
}
