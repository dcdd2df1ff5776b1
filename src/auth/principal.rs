//! Authenticated principals returned by the credential verifier and user directory.

// self
use crate::{_prelude::*, auth::UserId};

/// Role claim carried by access tokens, derived from the principal's admin flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
	/// Administrative principal.
	Admin,
	/// Regular principal.
	User,
}
impl Role {
	/// Returns the claim value written into access tokens.
	pub const fn as_str(self) -> &'static str {
		match self {
			Role::Admin => "Admin",
			Role::User => "User",
		}
	}
}
impl Display for Role {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Principal resolved from credentials or from a refresh token's owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
	/// Stable user identifier.
	pub id: UserId,
	/// Primary email address.
	pub email: String,
	/// Grants the `Admin` role when set.
	pub is_admin: bool,
}
impl Principal {
	/// Creates a non-admin principal.
	pub fn new(id: UserId, email: impl Into<String>) -> Self {
		Self { id, email: email.into(), is_admin: false }
	}

	/// Overrides the admin flag.
	pub fn with_admin(mut self, is_admin: bool) -> Self {
		self.is_admin = is_admin;

		self
	}

	/// Role claim for this principal.
	pub fn role(&self) -> Role {
		if self.is_admin { Role::Admin } else { Role::User }
	}
}
