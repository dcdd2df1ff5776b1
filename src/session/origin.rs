//! Origin allow-list applied to refresh calls.

// self
use crate::{_prelude::*, config::SessionConfig, error::ConfigError};

/// Parsed allow-list of `scheme://host[:port]` origins.
///
/// Inactive in development and when the list is empty; otherwise a refresh without an
/// origin, or with one outside the list, is rejected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OriginPolicy {
	allowed: Vec<String>,
	enforced: bool,
}
impl OriginPolicy {
	/// Builds the policy from `config`, rejecting unparsable or opaque origins.
	pub fn from_config(config: &SessionConfig) -> Result<Self, ConfigError> {
		let allowed = config
			.allowed_origins
			.iter()
			.map(|origin| {
				let url = Url::parse(origin).map_err(|source| ConfigError::InvalidOrigin {
					origin: origin.clone(),
					source,
				})?;

				serialize(&url).ok_or_else(|| ConfigError::OpaqueOrigin { origin: origin.clone() })
			})
			.collect::<Result<Vec<_>, _>>()?;
		let enforced = !config.environment.is_development() && !allowed.is_empty();

		Ok(Self { allowed, enforced })
	}

	/// Returns `true` when the policy checks origins at all.
	pub fn is_enforced(&self) -> bool {
		self.enforced
	}

	/// Returns `true` when `origin` may call refresh.
	pub fn allows(&self, origin: Option<&str>) -> bool {
		if !self.enforced {
			return true;
		}

		origin
			.and_then(|origin| Url::parse(origin).ok())
			.and_then(|url| serialize(&url))
			.is_some_and(|origin| self.allowed.contains(&origin))
	}
}

fn serialize(url: &Url) -> Option<String> {
	let origin = url.origin();

	origin.is_tuple().then(|| origin.ascii_serialization())
}
