//! Fire-and-forget audit publication.
//!
//! Session flows hand events to an [`AuditEmitter`], which pushes them onto a bounded
//! queue drained by a background task. Publication never blocks or fails a flow: a full
//! queue drops the event, and sink errors or timeouts are only logged locally.

pub mod sink;

pub use sink::*;

// crates.io
use tokio::sync::{mpsc, oneshot};
// self
use crate::{_prelude::*, config::AuditConfig};

/// Boxed future returned by [`AuditSink::publish`].
pub type AuditFuture<'a> = Pin<Box<dyn Future<Output = Result<(), AuditError>> + 'a + Send>>;

/// Destination for audit events (message bus, log pipeline, test buffer).
pub trait AuditSink
where
	Self: Send + Sync,
{
	/// Publishes one event.
	fn publish<'a>(&'a self, event: &'a AuditEvent) -> AuditFuture<'a>;
}

/// Failure reported by an [`AuditSink`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AuditError {
	/// Sink-specific failure.
	#[error("Audit sink failure: {message}.")]
	Sink {
		/// Human-readable error payload.
		message: String,
	},
}

/// Severity attached to an audit event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditLevel {
	/// Expected activity (successful login, refresh, logout).
	Info,
	/// Rejected or suspicious activity.
	Warning,
}
impl AuditLevel {
	/// Returns a stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuditLevel::Info => "info",
			AuditLevel::Warning => "warning",
		}
	}
}

/// Security-relevant event describing a session operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
	/// Emitting component.
	pub source: String,
	/// Severity.
	pub level: AuditLevel,
	/// Short description such as `login.success`.
	pub message: String,
	/// Emission instant (UTC).
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp_utc: OffsetDateTime,
	/// Free-form fields; never carries bearer secrets.
	pub metadata: BTreeMap<String, String>,
}
impl AuditEvent {
	/// Creates an event stamped with the current time.
	pub fn new(source: impl Into<String>, level: AuditLevel, message: impl Into<String>) -> Self {
		Self {
			source: source.into(),
			level,
			message: message.into(),
			timestamp_utc: OffsetDateTime::now_utc(),
			metadata: BTreeMap::new(),
		}
	}

	/// Adds a metadata field.
	pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
		self.metadata.insert(key.into(), value.to_string());

		self
	}
}

enum Command {
	Publish(AuditEvent),
	Flush(oneshot::Sender<()>),
}

/// Cloneable handle feeding the background publication task.
#[derive(Clone)]
pub struct AuditEmitter {
	tx: mpsc::Sender<Command>,
	source: Arc<str>,
}
impl AuditEmitter {
	/// Spawns the draining task on the current Tokio runtime.
	///
	/// The task ends once every emitter clone has been dropped.
	pub fn spawn(sink: Arc<dyn AuditSink>, config: &AuditConfig) -> Self {
		let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
		let timeout = std::time::Duration::from_millis(config.publish_timeout_ms);

		tokio::spawn(drain(rx, sink, timeout));

		Self { tx, source: Arc::from(config.source.as_str()) }
	}

	/// Builds an event carrying this emitter's source.
	pub fn event(&self, level: AuditLevel, message: &str) -> AuditEvent {
		AuditEvent::new(self.source.as_ref(), level, message)
	}

	/// Queues `event` without waiting; drops it when the queue is full or closed.
	pub fn emit(&self, event: AuditEvent) {
		match self.tx.try_send(Command::Publish(event)) {
			Ok(()) => {},
			Err(mpsc::error::TrySendError::Full(Command::Publish(event))) => {
				tracing::warn!(message = %event.message, "Audit queue is full; event dropped.");
			},
			Err(_) => {
				tracing::warn!("Audit worker is gone; event dropped.");
			},
		}
	}

	/// Waits until every event queued before this call has been handled.
	pub async fn flush(&self) {
		let (reply, done) = oneshot::channel();

		if self.tx.send(Command::Flush(reply)).await.is_ok() {
			let _ = done.await;
		}
	}
}
impl Debug for AuditEmitter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuditEmitter")
			.field("source", &self.source)
			.field("capacity", &self.tx.max_capacity())
			.finish()
	}
}

async fn drain(
	mut rx: mpsc::Receiver<Command>,
	sink: Arc<dyn AuditSink>,
	timeout: std::time::Duration,
) {
	while let Some(command) = rx.recv().await {
		match command {
			Command::Publish(event) => match tokio::time::timeout(timeout, sink.publish(&event)).await
			{
				Ok(Ok(())) => {},
				Ok(Err(e)) => {
					tracing::warn!(message = %event.message, error = %e, "Audit publication failed.");
				},
				Err(_) => {
					tracing::warn!(
						message = %event.message,
						timeout_ms = timeout.as_millis() as u64,
						"Audit publication timed out."
					);
				},
			},
			Command::Flush(reply) => {
				let _ = reply.send(());
			},
		}
	}
}
