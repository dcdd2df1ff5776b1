//! Credential verification and principal lookup seams.

// crates.io
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{Principal, UserId},
};

/// Boxed future returned by directory lookups.
pub type DirectoryFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Option<Principal>, DirectoryError>> + 'a + Send>>;

/// Checks an email/password pair.
pub trait CredentialVerifier
where
	Self: Send + Sync,
{
	/// Returns the principal when the credentials match, `None` otherwise.
	fn validate<'a>(&'a self, email: &'a str, password: &'a str) -> DirectoryFuture<'a>;
}

/// Resolves principals by id when rotating refresh tokens.
pub trait UserDirectory
where
	Self: Send + Sync,
{
	/// Returns the principal for `user_id`, or `None` when the user no longer exists.
	fn get_by_id<'a>(&'a self, user_id: &'a UserId) -> DirectoryFuture<'a>;
}

/// Failure raised by a directory backend.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum DirectoryError {
	/// Backend failure.
	#[error("User directory failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[derive(Clone)]
struct Account {
	principal: Principal,
	password_digest: [u8; 32],
}

#[derive(Default)]
struct Accounts {
	by_email: HashMap<String, UserId>,
	by_id: HashMap<UserId, Account>,
}

/// In-process account table backing both [`CredentialVerifier`] and [`UserDirectory`].
///
/// Passwords are kept as SHA-256 digests; emails match case-insensitively.
#[derive(Clone, Default)]
pub struct MemoryDirectory(Arc<RwLock<Accounts>>);
impl MemoryDirectory {
	/// Adds or replaces an account.
	pub fn insert(&self, principal: Principal, password: &str) {
		let mut accounts = self.0.write();
		let email = normalize(&principal.email);

		if let Some(previous) = accounts.by_id.get(&principal.id) {
			let previous = normalize(&previous.principal.email);

			accounts.by_email.remove(&previous);
		}

		accounts.by_email.insert(email, principal.id.clone());
		accounts
			.by_id
			.insert(principal.id.clone(), Account { principal, password_digest: digest(password) });
	}

	/// Adds an account and returns `self` for chaining.
	pub fn with_user(self, principal: Principal, password: &str) -> Self {
		self.insert(principal, password);

		self
	}

	/// Removes an account; later lookups by id return `None`.
	pub fn remove(&self, user_id: &UserId) -> Option<Principal> {
		let mut accounts = self.0.write();
		let account = accounts.by_id.remove(user_id)?;

		accounts.by_email.remove(&normalize(&account.principal.email));

		Some(account.principal)
	}

	/// Number of accounts.
	pub fn len(&self) -> usize {
		self.0.read().by_id.len()
	}

	/// Returns `true` when no accounts exist.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn check(&self, email: &str, password: &str) -> Option<Principal> {
		let accounts = self.0.read();
		let id = accounts.by_email.get(&normalize(email))?;
		let account = accounts.by_id.get(id)?;

		(account.password_digest == digest(password)).then(|| account.principal.clone())
	}
}
impl CredentialVerifier for MemoryDirectory {
	fn validate<'a>(&'a self, email: &'a str, password: &'a str) -> DirectoryFuture<'a> {
		Box::pin(async move { Ok(self.check(email, password)) })
	}
}
impl UserDirectory for MemoryDirectory {
	fn get_by_id<'a>(&'a self, user_id: &'a UserId) -> DirectoryFuture<'a> {
		Box::pin(async move {
			Ok(self.0.read().by_id.get(user_id).map(|account| account.principal.clone()))
		})
	}
}
impl Debug for MemoryDirectory {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MemoryDirectory").field("accounts", &self.len()).finish()
	}
}

fn normalize(email: &str) -> String {
	email.trim().to_lowercase()
}

fn digest(password: &str) -> [u8; 32] {
	let mut out = [0_u8; 32];

	out.copy_from_slice(&Sha256::digest(password.as_bytes()));

	out
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn directory() -> (MemoryDirectory, UserId) {
		let id = UserId::new("user-1").expect("User fixture should be valid.");
		let directory = MemoryDirectory::default()
			.with_user(Principal::new(id.clone(), "Alice@Example.com"), "correct horse");

		(directory, id)
	}

	#[tokio::test]
	async fn validates_case_insensitive_email_and_exact_password() {
		let (directory, id) = directory();
		let principal = directory
			.validate(" alice@example.COM", "correct horse")
			.await
			.expect("Memory lookups never fail.")
			.expect("Matching credentials should resolve.");

		assert_eq!(principal.id, id);
		assert!(
			directory
				.validate("alice@example.com", "Correct horse")
				.await
				.expect("Memory lookups never fail.")
				.is_none()
		);
		assert!(
			directory
				.validate("nobody@example.com", "correct horse")
				.await
				.expect("Memory lookups never fail.")
				.is_none()
		);
	}

	#[tokio::test]
	async fn removed_users_disappear_from_both_views() {
		let (directory, id) = directory();

		assert!(directory.get_by_id(&id).await.expect("Memory lookups never fail.").is_some());
		assert!(directory.remove(&id).is_some());
		assert!(directory.get_by_id(&id).await.expect("Memory lookups never fail.").is_none());
		assert!(
			directory
				.validate("alice@example.com", "correct horse")
				.await
				.expect("Memory lookups never fail.")
				.is_none()
		);
		assert!(directory.is_empty());
	}

	#[test]
	fn replacing_an_account_rebinds_its_email() {
		let (directory, id) = directory();

		directory.insert(Principal::new(id, "alice@new.example"), "pw");

		assert_eq!(directory.len(), 1);
		assert!(directory.check("alice@example.com", "pw").is_none());
		assert!(directory.check("alice@new.example", "pw").is_some());
	}
}
