//! Thread-safe in-memory [`RefreshTokenStore`] for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{NewRefreshToken, RefreshToken, UserId},
	store::{self, ClaimOutcome, RefreshTokenStore, StoreError, StoreFuture},
};

#[derive(Debug, Default)]
struct Table {
	rows: HashMap<String, RefreshToken>,
	last_id: i64,
}

type SharedTable = Arc<RwLock<Table>>;

/// Storage backend that keeps rows in-process.
///
/// Every mutation happens under one write guard that is never held across an await, so
/// the claim is as atomic as a conditional `UPDATE` in a database.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(SharedTable);
impl MemoryStore {
	/// Number of rows (active or terminal) currently stored.
	pub fn len(&self) -> usize {
		self.0.read().rows.len()
	}

	/// Returns `true` when no row was ever inserted.
	pub fn is_empty(&self) -> bool {
		self.0.read().rows.is_empty()
	}

	/// Rows owned by `user_id`, ordered by id. Intended for inspection in tests and tools.
	pub fn rows_for(&self, user_id: &UserId) -> Vec<RefreshToken> {
		let mut rows = self
			.0
			.read()
			.rows
			.values()
			.filter(|row| &row.user_id == user_id)
			.cloned()
			.collect::<Vec<_>>();

		rows.sort_by_key(|row| row.id);

		rows
	}

	fn insert_now(table: SharedTable, token: NewRefreshToken) -> Result<RefreshToken, StoreError> {
		let mut guard = table.write();

		if guard.rows.contains_key(token.token.expose()) {
			return Err(StoreError::Conflict);
		}

		guard.last_id += 1;

		let record = token.into_record(guard.last_id);

		guard.rows.insert(record.token.expose().to_owned(), record.clone());

		Ok(record)
	}

	fn claim_now(table: SharedTable, token: &str, now: OffsetDateTime) -> ClaimOutcome {
		let mut guard = table.write();

		store::claim_in_place(guard.rows.get_mut(token), now)
	}

	fn invalidate_now(table: SharedTable, token: &str) -> bool {
		let mut guard = table.write();

		match guard.rows.get_mut(token) {
			Some(record) => {
				record.invalidated = true;

				true
			},
			None => false,
		}
	}

	fn invalidate_user_now(table: SharedTable, user_id: &UserId) -> u64 {
		let mut guard = table.write();
		let mut changed = 0;

		for record in guard.rows.values_mut().filter(|row| &row.user_id == user_id) {
			if !record.invalidated {
				record.invalidated = true;
				changed += 1;
			}
		}

		changed
	}
}
impl RefreshTokenStore for MemoryStore {
	fn insert(&self, token: NewRefreshToken) -> StoreFuture<'_, RefreshToken> {
		let table = self.0.clone();

		Box::pin(async move { Self::insert_now(table, token) })
	}

	fn try_claim<'a>(
		&'a self,
		token: &'a str,
		now: OffsetDateTime,
	) -> StoreFuture<'a, ClaimOutcome> {
		let table = self.0.clone();

		Box::pin(async move { Ok(Self::claim_now(table, token, now)) })
	}

	fn invalidate<'a>(&'a self, token: &'a str) -> StoreFuture<'a, bool> {
		let table = self.0.clone();

		Box::pin(async move { Ok(Self::invalidate_now(table, token)) })
	}

	fn invalidate_user<'a>(&'a self, user_id: &'a UserId) -> StoreFuture<'a, u64> {
		let table = self.0.clone();

		Box::pin(async move { Ok(Self::invalidate_user_now(table, user_id)) })
	}
}
