//! Refresh-token records, redacted secrets, and issued session pairs.

pub mod record;
pub mod secret;
pub mod session;
