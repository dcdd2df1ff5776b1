//! Rotating refresh-token sessions for multi-service backends: short-lived signed access
//! tokens, single-use refresh tokens claimed atomically, and keyed abuse-rate limiting in
//! front of login, refresh, and logout.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod audit;
pub mod auth;
pub mod config;
pub mod cookie;
pub mod directory;
pub mod error;
pub mod issuer;
pub mod limit;
pub mod obs;
pub mod session;
pub mod store;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		net::IpAddr,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use url;
