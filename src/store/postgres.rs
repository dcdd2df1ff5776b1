//! PostgreSQL-backed [`RefreshTokenStore`] (enable the `postgres` feature).
//!
//! Claims are a single conditional `UPDATE ... RETURNING`; zero returned rows means the
//! claim lost, and only then is the row read (without mutation) to classify the reason.

// crates.io
use sqlx::{
	PgPool, Row,
	postgres::{PgPoolOptions, PgRow},
};
// self
use crate::{
	_prelude::*,
	auth::{AccessTokenId, NewRefreshToken, RefreshToken, TokenSecret, UserId},
	store::{ClaimOutcome, ClaimRejection, RefreshTokenStore, StoreError, StoreFuture},
};

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS refresh_tokens (
	id              BIGSERIAL PRIMARY KEY,
	token           TEXT        NOT NULL UNIQUE,
	access_token_id TEXT        NOT NULL,
	user_id         TEXT        NOT NULL,
	created_at      TIMESTAMPTZ NOT NULL,
	expires_at      TIMESTAMPTZ NOT NULL,
	used            BOOLEAN     NOT NULL DEFAULT FALSE,
	invalidated     BOOLEAN     NOT NULL DEFAULT FALSE
)";
const USER_INDEX: &str =
	"CREATE INDEX IF NOT EXISTS refresh_tokens_user_id_idx ON refresh_tokens (user_id)";
const INSERT: &str = "\
INSERT INTO refresh_tokens (token, access_token_id, user_id, created_at, expires_at)
VALUES ($1, $2, $3, $4, $5)
RETURNING id";
// `FALSE AS used` hands back the pre-mutation view of the claimed row.
const CLAIM: &str = "\
UPDATE refresh_tokens SET used = TRUE
WHERE token = $1 AND used = FALSE AND invalidated = FALSE AND expires_at > $2
RETURNING id, token, access_token_id, user_id, created_at, expires_at, FALSE AS used, invalidated";
const CLASSIFY: &str = "\
SELECT id, token, access_token_id, user_id, created_at, expires_at, used, invalidated
FROM refresh_tokens WHERE token = $1";
const INVALIDATE: &str = "UPDATE refresh_tokens SET invalidated = TRUE WHERE token = $1";
const INVALIDATE_USER: &str =
	"UPDATE refresh_tokens SET invalidated = TRUE WHERE user_id = $1 AND invalidated = FALSE";

/// Refresh-token table in PostgreSQL, shared by every service instance.
#[derive(Clone, Debug)]
pub struct PostgresStore {
	pool: PgPool,
}
impl PostgresStore {
	/// Wraps an existing pool.
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	/// Connects a new pool with `max_connections` connections.
	pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
		let pool = PgPoolOptions::new()
			.max_connections(max_connections)
			.connect(url)
			.await
			.map_err(backend)?;

		Ok(Self::new(pool))
	}

	/// Creates the `refresh_tokens` table and its owner index when missing.
	pub async fn ensure_schema(&self) -> Result<(), StoreError> {
		sqlx::query(SCHEMA).execute(&self.pool).await.map_err(backend)?;
		sqlx::query(USER_INDEX).execute(&self.pool).await.map_err(backend)?;

		Ok(())
	}

	fn decode(row: &PgRow) -> Result<RefreshToken, StoreError> {
		let user_id: String = row.try_get("user_id").map_err(serialization)?;
		let access_token_id: String = row.try_get("access_token_id").map_err(serialization)?;
		let token: String = row.try_get("token").map_err(serialization)?;

		Ok(RefreshToken {
			id: row.try_get("id").map_err(serialization)?,
			token: TokenSecret::new(token),
			access_token_id: AccessTokenId::new(access_token_id).map_err(|e| {
				StoreError::Serialization { message: format!("Stored access token id: {e}") }
			})?,
			user_id: UserId::new(user_id).map_err(|e| StoreError::Serialization {
				message: format!("Stored user id: {e}"),
			})?,
			created_at: row.try_get("created_at").map_err(serialization)?,
			expires_at: row.try_get("expires_at").map_err(serialization)?,
			used: row.try_get("used").map_err(serialization)?,
			invalidated: row.try_get("invalidated").map_err(serialization)?,
		})
	}
}
impl RefreshTokenStore for PostgresStore {
	fn insert(&self, token: NewRefreshToken) -> StoreFuture<'_, RefreshToken> {
		Box::pin(async move {
			let row = sqlx::query(INSERT)
				.bind(token.token.expose())
				.bind(token.access_token_id.as_ref())
				.bind(token.user_id.as_ref())
				.bind(token.created_at)
				.bind(token.expires_at)
				.fetch_one(&self.pool)
				.await
				.map_err(|e| match e {
					sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict,
					e => backend(e),
				})?;
			let id = row.try_get("id").map_err(serialization)?;

			Ok(token.into_record(id))
		})
	}

	fn try_claim<'a>(
		&'a self,
		token: &'a str,
		now: OffsetDateTime,
	) -> StoreFuture<'a, ClaimOutcome> {
		Box::pin(async move {
			let claimed = sqlx::query(CLAIM)
				.bind(token)
				.bind(now)
				.fetch_optional(&self.pool)
				.await
				.map_err(backend)?;

			if let Some(row) = claimed {
				return Ok(ClaimOutcome::Claimed(Self::decode(&row)?));
			}

			let existing =
				sqlx::query(CLASSIFY).bind(token).fetch_optional(&self.pool).await.map_err(backend)?;
			let rejection = match existing {
				Some(row) => ClaimRejection::for_record(&Self::decode(&row)?, now),
				None => ClaimRejection::unknown(),
			};

			Ok(ClaimOutcome::Rejected(rejection))
		})
	}

	fn invalidate<'a>(&'a self, token: &'a str) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let result =
				sqlx::query(INVALIDATE).bind(token).execute(&self.pool).await.map_err(backend)?;

			Ok(result.rows_affected() > 0)
		})
	}

	fn invalidate_user<'a>(&'a self, user_id: &'a UserId) -> StoreFuture<'a, u64> {
		Box::pin(async move {
			let result = sqlx::query(INVALIDATE_USER)
				.bind(user_id.as_ref())
				.execute(&self.pool)
				.await
				.map_err(backend)?;

			Ok(result.rows_affected())
		})
	}
}

fn backend(e: sqlx::Error) -> StoreError {
	StoreError::Backend { message: e.to_string() }
}

fn serialization(e: sqlx::Error) -> StoreError {
	StoreError::Serialization { message: e.to_string() }
}
