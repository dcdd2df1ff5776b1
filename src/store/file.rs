//! Simple file-backed [`RefreshTokenStore`] for single-instance deployments.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{NewRefreshToken, RefreshToken, UserId},
	store::{self, ClaimOutcome, RefreshTokenStore, StoreError, StoreFuture},
};

/// Persists refresh-token rows to a JSON file after each mutation.
///
/// A mutation is applied under the write guard and then flushed through a temp file +
/// rename. If the flush fails the call errors, and the in-memory row keeps the mutation,
/// which for claims means the token stays consumed.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Snapshot>>,
}
#[derive(Debug, Default)]
struct Snapshot {
	rows: HashMap<String, RefreshToken>,
	last_id: i64,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the JSON snapshot.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
		if !path.exists() {
			return Ok(Snapshot::default());
		}

		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(Snapshot::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let rows: Vec<RefreshToken> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;
		let last_id = rows.iter().map(|row| row.id).max().unwrap_or(0);

		Ok(Snapshot {
			rows: rows.into_iter().map(|row| (row.token.expose().to_owned(), row)).collect(),
			last_id,
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}
		Ok(())
	}

	fn persist_locked(&self, contents: &Snapshot) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let mut rows: Vec<_> = contents.rows.values().collect();

		rows.sort_by_key(|row| row.id);

		let serialized = serde_json::to_vec_pretty(&rows).map_err(|e| {
			StoreError::Serialization { message: format!("Failed to serialize store snapshot: {e}") }
		})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl RefreshTokenStore for FileStore {
	fn insert(&self, token: NewRefreshToken) -> StoreFuture<'_, RefreshToken> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			if guard.rows.contains_key(token.token.expose()) {
				return Err(StoreError::Conflict);
			}

			guard.last_id += 1;

			let record = token.into_record(guard.last_id);

			guard.rows.insert(record.token.expose().to_owned(), record.clone());
			self.persist_locked(&guard)?;

			Ok(record)
		})
	}

	fn try_claim<'a>(
		&'a self,
		token: &'a str,
		now: OffsetDateTime,
	) -> StoreFuture<'a, ClaimOutcome> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let outcome = store::claim_in_place(guard.rows.get_mut(token), now);

			if matches!(outcome, ClaimOutcome::Claimed(_)) {
				self.persist_locked(&guard)?;
			}

			Ok(outcome)
		})
	}

	fn invalidate<'a>(&'a self, token: &'a str) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let changed = match guard.rows.get_mut(token) {
				Some(record) if record.invalidated => return Ok(true),
				Some(record) => {
					record.invalidated = true;

					true
				},
				None => return Ok(false),
			};

			self.persist_locked(&guard)?;

			Ok(changed)
		})
	}

	fn invalidate_user<'a>(&'a self, user_id: &'a UserId) -> StoreFuture<'a, u64> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let mut changed = 0;

			for record in guard.rows.values_mut().filter(|row| &row.user_id == user_id) {
				if !record.invalidated {
					record.invalidated = true;
					changed += 1;
				}
			}

			if changed > 0 {
				self.persist_locked(&guard)?;
			}

			Ok(changed)
		})
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use tokio::runtime::Runtime;
	// self
	use super::*;
	use crate::auth::AccessTokenId;

	fn temp_path() -> PathBuf {
		let unique = format!(
			"session_broker_file_store_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	fn build_row(value: &str) -> NewRefreshToken {
		let user = UserId::new("user-demo").expect("Failed to build user fixture.");
		let jti = AccessTokenId::new("jti-demo").expect("Failed to build jti fixture.");

		RefreshToken::builder(user)
			.token(value)
			.access_token_id(jti)
			.expires_in(Duration::days(7))
			.build()
			.expect("Failed to build file-store test row.")
	}

	#[test]
	fn claims_survive_reopen() {
		let path = temp_path();
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");
		let first = rt
			.block_on(store.insert(build_row("refresh-a")))
			.expect("Failed to insert first row into file store.");
		let second = rt
			.block_on(store.insert(build_row("refresh-b")))
			.expect("Failed to insert second row into file store.");

		assert_eq!((first.id, second.id), (1, 2));

		let claimed = rt
			.block_on(store.try_claim("refresh-a", OffsetDateTime::now_utc()))
			.expect("Claim against file store should not error.");

		assert!(matches!(claimed, ClaimOutcome::Claimed(_)));
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");
		let replay = rt
			.block_on(reopened.try_claim("refresh-a", OffsetDateTime::now_utc()))
			.expect("Replay claim should not error.");

		assert!(matches!(replay, ClaimOutcome::Rejected(_)), "Used flag must survive reopen.");

		let third = rt
			.block_on(reopened.insert(build_row("refresh-c")))
			.expect("Insert after reopen should succeed.");

		assert_eq!(third.id, 3, "Ids must continue after the highest persisted id.");

		let conflict = rt.block_on(reopened.insert(build_row("refresh-b")));

		assert_eq!(conflict.expect_err("Duplicate values must conflict."), StoreError::Conflict);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}
}
