//! Explicit, validated configuration handed to the issuer and session manager.
//!
//! Loading (files, environment, secret managers) stays with the host process; this module
//! only defines the shape, defaults, and startup validation. Units follow the settings'
//! names (`_minutes`, `_days`, `_secs`, `_ms`) so serialized configs stay readable.

// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError, limit::RateLimitRule};

/// Minimum accepted signing secret length in bytes (HS256 key size).
pub const MIN_SECRET_LEN: usize = 32;
/// Longest accepted access token lifetime in minutes (one day).
pub const MAX_ACCESS_TOKEN_MINUTES: u32 = 24 * 60;
/// Longest accepted refresh token lifetime in days.
pub const MAX_REFRESH_TOKEN_DAYS: u32 = 365;

/// Signing and lifetime settings for access and refresh tokens.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JwtConfig {
	/// Symmetric signing secret.
	pub secret: TokenSecret,
	/// `iss` claim written and required on validation.
	pub issuer: String,
	/// `aud` claim written and required on validation.
	pub audience: String,
	/// Access token lifetime in minutes.
	#[serde(default = "JwtConfig::default_access_token_minutes")]
	pub access_token_minutes: u32,
	/// Refresh token lifetime in days.
	#[serde(default = "JwtConfig::default_refresh_token_days")]
	pub refresh_token_days: u32,
	/// Clock-skew allowance applied to every access token validation.
	#[serde(default = "JwtConfig::default_clock_skew_secs")]
	pub clock_skew_secs: u32,
}
impl JwtConfig {
	const fn default_access_token_minutes() -> u32 {
		15
	}

	const fn default_refresh_token_days() -> u32 {
		7
	}

	const fn default_clock_skew_secs() -> u32 {
		30
	}

	/// Creates a config with default lifetimes and clock skew.
	pub fn new(
		secret: impl Into<String>,
		issuer: impl Into<String>,
		audience: impl Into<String>,
	) -> Self {
		Self {
			secret: TokenSecret::new(secret),
			issuer: issuer.into(),
			audience: audience.into(),
			access_token_minutes: Self::default_access_token_minutes(),
			refresh_token_days: Self::default_refresh_token_days(),
			clock_skew_secs: Self::default_clock_skew_secs(),
		}
	}

	/// Overrides the access token lifetime.
	pub fn with_access_token_minutes(mut self, minutes: u32) -> Self {
		self.access_token_minutes = minutes;

		self
	}

	/// Overrides the refresh token lifetime.
	pub fn with_refresh_token_days(mut self, days: u32) -> Self {
		self.refresh_token_days = days;

		self
	}

	/// Overrides the clock-skew allowance.
	pub fn with_clock_skew_secs(mut self, secs: u32) -> Self {
		self.clock_skew_secs = secs;

		self
	}

	/// Access token lifetime.
	pub fn access_lifetime(&self) -> Duration {
		Duration::minutes(i64::from(self.access_token_minutes))
	}

	/// Refresh token lifetime.
	pub fn refresh_lifetime(&self) -> Duration {
		Duration::days(i64::from(self.refresh_token_days))
	}

	/// Validates the signing and lifetime settings.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let actual = self.secret.expose().len();

		if actual < MIN_SECRET_LEN {
			return Err(ConfigError::SecretTooShort { min: MIN_SECRET_LEN, actual });
		}
		if self.issuer.trim().is_empty() {
			return Err(ConfigError::Empty { field: "jwt.issuer" });
		}
		if self.audience.trim().is_empty() {
			return Err(ConfigError::Empty { field: "jwt.audience" });
		}
		if self.access_token_minutes == 0 {
			return Err(ConfigError::NonPositive { field: "jwt.access_token_minutes" });
		}
		if self.refresh_token_days == 0 {
			return Err(ConfigError::NonPositive { field: "jwt.refresh_token_days" });
		}
		if self.access_token_minutes > MAX_ACCESS_TOKEN_MINUTES {
			return Err(ConfigError::OutOfRange {
				field: "jwt.access_token_minutes",
				max: MAX_ACCESS_TOKEN_MINUTES,
			});
		}
		if self.refresh_token_days > MAX_REFRESH_TOKEN_DAYS {
			return Err(ConfigError::OutOfRange {
				field: "jwt.refresh_token_days",
				max: MAX_REFRESH_TOKEN_DAYS,
			});
		}

		Ok(())
	}
}

/// Attempt budgets per limiter dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
	/// Login attempts per email.
	pub login_email: RateLimitRule,
	/// Login attempts per client address.
	pub login_ip: RateLimitRule,
	/// Refresh attempts per presented token.
	pub refresh: RateLimitRule,
	/// Logout attempts per presented token.
	pub logout: RateLimitRule,
}
impl RateLimitConfig {
	fn validate(&self) -> Result<(), ConfigError> {
		for (dimension, window_field, rule) in [
			("login_email", "rate_limits.login_email.window_secs", self.login_email),
			("login_ip", "rate_limits.login_ip.window_secs", self.login_ip),
			("refresh", "rate_limits.refresh.window_secs", self.refresh),
			("logout", "rate_limits.logout.window_secs", self.logout),
		] {
			if rule.limit == 0 {
				return Err(ConfigError::ZeroLimit { dimension });
			}
			if rule.window_secs == 0 {
				return Err(ConfigError::NonPositive { field: window_field });
			}
		}

		Ok(())
	}
}
impl Default for RateLimitConfig {
	fn default() -> Self {
		Self {
			login_email: RateLimitRule::per_minute(5),
			login_ip: RateLimitRule::per_minute(10),
			refresh: RateLimitRule::per_minute(10),
			logout: RateLimitRule::per_minute(10),
		}
	}
}

/// Deployment environment; development relaxes origin checks and `Secure` cookies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
	/// Local development.
	Development,
	/// Any shared or production deployment.
	#[default]
	Production,
}
impl Environment {
	/// Returns `true` for local development.
	pub fn is_development(self) -> bool {
		matches!(self, Environment::Development)
	}
}

/// What to do when an already redeemed or invalidated refresh token is presented again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayPolicy {
	/// Reject the request only.
	#[default]
	Reject,
	/// Reject the request and invalidate every refresh token of the owner.
	RevokeUser,
}

/// Fire-and-forget audit publication settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
	/// `source` field stamped on every event.
	pub source: String,
	/// Events buffered before new ones are dropped.
	pub queue_capacity: usize,
	/// Per-event publication timeout.
	pub publish_timeout_ms: u64,
}
impl AuditConfig {
	/// Per-event publication timeout.
	pub fn publish_timeout(&self) -> Duration {
		Duration::milliseconds(i64::try_from(self.publish_timeout_ms).unwrap_or(i64::MAX))
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.source.trim().is_empty() {
			return Err(ConfigError::Empty { field: "audit.source" });
		}
		if self.queue_capacity == 0 {
			return Err(ConfigError::NonPositive { field: "audit.queue_capacity" });
		}
		if self.publish_timeout_ms == 0 {
			return Err(ConfigError::NonPositive { field: "audit.publish_timeout_ms" });
		}

		Ok(())
	}
}
impl Default for AuditConfig {
	fn default() -> Self {
		Self { source: "session-broker".into(), queue_capacity: 1_024, publish_timeout_ms: 2_000 }
	}
}

/// Complete session manager configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
	/// Token signing and lifetimes.
	pub jwt: JwtConfig,
	/// Limiter budgets.
	#[serde(default)]
	pub rate_limits: RateLimitConfig,
	/// Deployment environment.
	#[serde(default)]
	pub environment: Environment,
	/// Origins allowed to call refresh outside development; empty disables the check.
	#[serde(default)]
	pub allowed_origins: Vec<String>,
	/// Default deadline for each store and limiter call.
	#[serde(default = "SessionConfig::default_store_timeout_ms")]
	pub store_timeout_ms: u64,
	/// Audit publication.
	#[serde(default)]
	pub audit: AuditConfig,
	/// Replay handling.
	#[serde(default)]
	pub replay_policy: ReplayPolicy,
}
impl SessionConfig {
	const fn default_store_timeout_ms() -> u64 {
		5_000
	}

	/// Creates a production config with default limits around `jwt`.
	pub fn new(jwt: JwtConfig) -> Self {
		Self {
			jwt,
			rate_limits: RateLimitConfig::default(),
			environment: Environment::default(),
			allowed_origins: Vec::new(),
			store_timeout_ms: Self::default_store_timeout_ms(),
			audit: AuditConfig::default(),
			replay_policy: ReplayPolicy::default(),
		}
	}

	/// Overrides the limiter budgets.
	pub fn with_rate_limits(mut self, rate_limits: RateLimitConfig) -> Self {
		self.rate_limits = rate_limits;

		self
	}

	/// Overrides the deployment environment.
	pub fn with_environment(mut self, environment: Environment) -> Self {
		self.environment = environment;

		self
	}

	/// Replaces the origin allow-list.
	pub fn with_allowed_origins<I, S>(mut self, origins: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.allowed_origins = origins.into_iter().map(Into::into).collect();

		self
	}

	/// Overrides the default store/limiter deadline.
	pub fn with_store_timeout_ms(mut self, timeout_ms: u64) -> Self {
		self.store_timeout_ms = timeout_ms;

		self
	}

	/// Overrides the audit settings.
	pub fn with_audit(mut self, audit: AuditConfig) -> Self {
		self.audit = audit;

		self
	}

	/// Overrides the replay policy.
	pub fn with_replay_policy(mut self, policy: ReplayPolicy) -> Self {
		self.replay_policy = policy;

		self
	}

	/// Default store/limiter deadline.
	pub fn store_timeout(&self) -> Duration {
		Duration::milliseconds(i64::try_from(self.store_timeout_ms).unwrap_or(i64::MAX))
	}

	/// Validates every section; call once at startup.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.jwt.validate()?;
		self.rate_limits.validate()?;
		self.audit.validate()?;

		if self.store_timeout_ms == 0 {
			return Err(ConfigError::NonPositive { field: "store_timeout_ms" });
		}

		Ok(())
	}
}
