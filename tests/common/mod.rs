#![allow(dead_code)]

// std
use std::{
	net::IpAddr,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
};
// crates.io
use parking_lot::Mutex;
use time::OffsetDateTime;
// self
use session_broker::{
	audit::{AuditEmitter, AuditError, AuditEvent, AuditFuture, AuditSink, MemoryAuditSink},
	auth::{NewRefreshToken, Principal, RefreshToken, UserId},
	config::{AuditConfig, JwtConfig, SessionConfig},
	directory::{CredentialVerifier, DirectoryFuture, MemoryDirectory},
	limit::MemoryRateLimiter,
	session::SessionManager,
	store::{ClaimOutcome, MemoryStore, RefreshTokenStore, StoreError, StoreFuture},
};

pub const SECRET: &str = "integration-secret-0123456789abcdef";
pub const EMAIL: &str = "alice@example.com";
pub const PASSWORD: &str = "correct horse battery staple";

pub fn client_ip() -> IpAddr {
	IpAddr::from([203, 0, 113, 7])
}

pub fn base_config() -> SessionConfig {
	SessionConfig::new(JwtConfig::new(SECRET, "session-broker", "api"))
}

pub fn alice() -> Principal {
	Principal::new(UserId::new("alice").expect("User fixture should be valid."), EMAIL)
}

pub fn bob() -> Principal {
	Principal::new(UserId::new("bob").expect("User fixture should be valid."), "bob@example.com")
}

/// Memory store that can be told to fail inserts.
#[derive(Clone, Debug, Default)]
pub struct FlakyStore {
	pub inner: MemoryStore,
	fail_inserts: Arc<AtomicBool>,
}
impl FlakyStore {
	pub fn fail_inserts(&self, fail: bool) {
		self.fail_inserts.store(fail, Ordering::SeqCst);
	}
}
impl RefreshTokenStore for FlakyStore {
	fn insert(&self, token: NewRefreshToken) -> StoreFuture<'_, RefreshToken> {
		if self.fail_inserts.load(Ordering::SeqCst) {
			return Box::pin(async {
				Err(StoreError::Backend { message: "insert refused by test store".into() })
			});
		}

		self.inner.insert(token)
	}

	fn try_claim<'a>(&'a self, token: &'a str, now: OffsetDateTime) -> StoreFuture<'a, ClaimOutcome> {
		self.inner.try_claim(token, now)
	}

	fn invalidate<'a>(&'a self, token: &'a str) -> StoreFuture<'a, bool> {
		self.inner.invalidate(token)
	}

	fn invalidate_user<'a>(&'a self, user_id: &'a UserId) -> StoreFuture<'a, u64> {
		self.inner.invalidate_user(user_id)
	}
}

/// Audit sink that rejects every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingAuditSink;
impl AuditSink for FailingAuditSink {
	fn publish<'a>(&'a self, _: &'a AuditEvent) -> AuditFuture<'a> {
		Box::pin(async { Err(AuditError::Sink { message: "bus unavailable".into() }) })
	}
}

/// Audit sink that never completes.
#[derive(Clone, Copy, Debug, Default)]
pub struct StallingAuditSink;
impl AuditSink for StallingAuditSink {
	fn publish<'a>(&'a self, _: &'a AuditEvent) -> AuditFuture<'a> {
		Box::pin(std::future::pending())
	}
}

/// Credential verifier that records the emails it was asked about.
#[derive(Clone, Debug)]
pub struct RecordingVerifier {
	inner: MemoryDirectory,
	seen: Arc<Mutex<Vec<String>>>,
}
impl RecordingVerifier {
	pub fn new(inner: MemoryDirectory) -> Self {
		Self { inner, seen: Default::default() }
	}

	pub fn seen(&self) -> Vec<String> {
		self.seen.lock().clone()
	}
}
impl CredentialVerifier for RecordingVerifier {
	fn validate<'a>(&'a self, email: &'a str, password: &'a str) -> DirectoryFuture<'a> {
		self.seen.lock().push(email.to_owned());

		self.inner.validate(email, password)
	}
}

/// Session manager wired to in-memory backends, with handles for inspection.
pub struct Harness {
	pub manager: SessionManager,
	pub store: FlakyStore,
	pub limiter: MemoryRateLimiter,
	pub directory: MemoryDirectory,
	pub audit: MemoryAuditSink,
}
impl Harness {
	pub fn new(config: SessionConfig) -> Self {
		let audit = MemoryAuditSink::default();

		Self::with_audit_sink(config, Arc::new(audit.clone()), audit)
	}

	pub fn with_audit_sink(
		config: SessionConfig,
		sink: Arc<dyn AuditSink>,
		audit: MemoryAuditSink,
	) -> Self {
		let store = FlakyStore::default();
		let limiter = MemoryRateLimiter::default();
		let directory = MemoryDirectory::default()
			.with_user(alice(), PASSWORD)
			.with_user(bob(), "bob's password");
		let audit_config = AuditConfig { publish_timeout_ms: 50, ..config.audit.clone() };
		let emitter = AuditEmitter::spawn(sink, &audit_config);
		let manager = SessionManager::new(
			config,
			Arc::new(store.clone()),
			Arc::new(limiter.clone()),
			Arc::new(directory.clone()),
			Arc::new(directory.clone()),
			emitter,
		)
		.expect("Harness config should be valid.");

		Self { manager, store, limiter, directory, audit }
	}

	/// Waits for queued audit events and returns the recorded messages.
	pub async fn audit_messages(&self) -> Vec<String> {
		self.manager.audit().flush().await;

		self.audit.messages()
	}
}
