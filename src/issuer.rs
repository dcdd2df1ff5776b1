//! Access token signing and refresh token value generation.
//!
//! The issuer is stateless: it never touches the refresh token store. Access tokens are
//! HS256 JWTs carrying `jti`, `sub`, `email`, `role`, `iss`, `aud`, `iat`, and `exp`;
//! refresh values are 256 bits of CSPRNG output encoded as unpadded base64url.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use rand::Rng;
use uuid::Uuid;
// self
use crate::{
	_prelude::*,
	auth::{
		AccessTokenId, IdentifierError, Principal, RefreshTokenBuilderError, Role, TokenSecret,
	},
	config::JwtConfig,
	error::ConfigError,
};

const REFRESH_TOKEN_BYTES: usize = 32;

/// Failures raised while minting access tokens.
#[derive(Debug, ThisError)]
pub enum IssuerError {
	/// The JWT could not be encoded or signed.
	#[error("Access token signing failed.")]
	Signing(#[source] jsonwebtoken::errors::Error),
	/// The generated `jti` did not pass identifier validation.
	#[error("Generated access token id is invalid.")]
	Identifier(#[from] IdentifierError),
	/// The expiry instant does not fit in a timestamp.
	#[error("Access token expiry is out of range.")]
	ExpiryOutOfRange,
	/// The refresh token row could not be assembled.
	#[error("Refresh token row is invalid.")]
	Record(#[from] RefreshTokenBuilderError),
}

/// Claims carried by every access token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
	/// Unique token id (UUIDv4).
	pub jti: String,
	/// Subject user id.
	pub sub: String,
	/// Subject email.
	pub email: String,
	/// Subject role.
	pub role: Role,
	/// Issuer.
	pub iss: String,
	/// Audience.
	pub aud: String,
	/// Issued-at, seconds since the Unix epoch.
	pub iat: i64,
	/// Expiry, seconds since the Unix epoch.
	pub exp: i64,
}

/// Signed access token plus its identifier and validity window.
#[derive(Clone, Debug)]
pub struct AccessToken {
	/// Compact JWT.
	pub token: TokenSecret,
	/// `jti` claim.
	pub jti: AccessTokenId,
	/// `iat` claim.
	pub issued_at: OffsetDateTime,
	/// `exp` claim.
	pub expires_at: OffsetDateTime,
}

/// Stateless access/refresh token minting.
#[derive(Clone)]
pub struct TokenIssuer {
	encoding: EncodingKey,
	decoding: DecodingKey,
	issuer: String,
	audience: String,
	access_lifetime: Duration,
	refresh_lifetime: Duration,
	clock_skew_secs: u64,
}
impl TokenIssuer {
	/// Validates `config` and prepares signing keys.
	pub fn new(config: &JwtConfig) -> Result<Self, ConfigError> {
		config.validate()?;

		let secret = config.secret.expose().as_bytes();

		Ok(Self {
			encoding: EncodingKey::from_secret(secret),
			decoding: DecodingKey::from_secret(secret),
			issuer: config.issuer.clone(),
			audience: config.audience.clone(),
			access_lifetime: config.access_lifetime(),
			refresh_lifetime: config.refresh_lifetime(),
			clock_skew_secs: u64::from(config.clock_skew_secs),
		})
	}

	/// Access token lifetime.
	pub fn access_lifetime(&self) -> Duration {
		self.access_lifetime
	}

	/// Refresh token lifetime.
	pub fn refresh_lifetime(&self) -> Duration {
		self.refresh_lifetime
	}

	/// Signs an access token for `principal` valid from now.
	pub fn issue_access_token(&self, principal: &Principal) -> Result<AccessToken, IssuerError> {
		self.issue_access_token_at(principal, OffsetDateTime::now_utc())
	}

	/// Signs an access token for `principal` issued at `now`.
	pub fn issue_access_token_at(
		&self,
		principal: &Principal,
		now: OffsetDateTime,
	) -> Result<AccessToken, IssuerError> {
		let jti = AccessTokenId::new(Uuid::new_v4().to_string())?;
		let expires_at =
			now.checked_add(self.access_lifetime).ok_or(IssuerError::ExpiryOutOfRange)?;
		let claims = AccessClaims {
			jti: jti.to_string(),
			sub: principal.id.to_string(),
			email: principal.email.clone(),
			role: principal.role(),
			iss: self.issuer.clone(),
			aud: self.audience.clone(),
			iat: now.unix_timestamp(),
			exp: expires_at.unix_timestamp(),
		};
		let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
			.map_err(IssuerError::Signing)?;

		Ok(AccessToken { token: TokenSecret::new(token), jti, issued_at: now, expires_at })
	}

	/// Generates a fresh opaque refresh token value.
	pub fn issue_refresh_token_value(&self) -> TokenSecret {
		let mut bytes = [0_u8; REFRESH_TOKEN_BYTES];

		rand::rng().fill(&mut bytes);

		TokenSecret::new(URL_SAFE_NO_PAD.encode(bytes))
	}

	/// Verifies signature, issuer, audience, and expiry (with clock-skew leeway).
	pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims> {
		let mut validation = Validation::new(Algorithm::HS256);

		validation.leeway = self.clock_skew_secs;
		validation.set_issuer(&[&self.issuer]);
		validation.set_audience(&[&self.audience]);
		validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

		let data = jsonwebtoken::decode::<AccessClaims>(token, &self.decoding, &validation)
			.map_err(|e| Error::InvalidAccessToken { reason: rejection_reason(e.kind()).into() })?;

		Ok(data.claims)
	}
}
impl Debug for TokenIssuer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenIssuer")
			.field("issuer", &self.issuer)
			.field("audience", &self.audience)
			.field("access_lifetime", &self.access_lifetime)
			.field("refresh_lifetime", &self.refresh_lifetime)
			.field("clock_skew_secs", &self.clock_skew_secs)
			.finish()
	}
}

fn rejection_reason(kind: &ErrorKind) -> &'static str {
	match kind {
		ErrorKind::ExpiredSignature => "expired",
		ErrorKind::ImmatureSignature => "not yet valid",
		ErrorKind::InvalidSignature => "bad signature",
		ErrorKind::InvalidIssuer => "wrong issuer",
		ErrorKind::InvalidAudience => "wrong audience",
		ErrorKind::InvalidAlgorithm => "unexpected algorithm",
		ErrorKind::MissingRequiredClaim(_) => "missing claim",
		_ => "malformed",
	}
}
