//! Built-in [`AuditSink`] implementations.

// self
use crate::{
	_prelude::*,
	audit::{AuditEvent, AuditFuture, AuditLevel, AuditSink},
};

/// Writes audit events to the `tracing` subscriber under the `audit` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;
impl AuditSink for TracingAuditSink {
	fn publish<'a>(&'a self, event: &'a AuditEvent) -> AuditFuture<'a> {
		Box::pin(async move {
			let metadata = serde_json::to_string(&event.metadata).unwrap_or_default();

			match event.level {
				AuditLevel::Info => tracing::info!(
					target: "audit",
					source = %event.source,
					timestamp_utc = %event.timestamp_utc,
					metadata = %metadata,
					"{}",
					event.message
				),
				AuditLevel::Warning => tracing::warn!(
					target: "audit",
					source = %event.source,
					timestamp_utc = %event.timestamp_utc,
					metadata = %metadata,
					"{}",
					event.message
				),
			}

			Ok(())
		})
	}
}

/// Buffers published events in memory for inspection.
#[derive(Clone, Debug, Default)]
pub struct MemoryAuditSink(Arc<Mutex<Vec<AuditEvent>>>);
impl MemoryAuditSink {
	/// Snapshot of the events published so far.
	pub fn events(&self) -> Vec<AuditEvent> {
		self.0.lock().clone()
	}

	/// Messages of the events published so far.
	pub fn messages(&self) -> Vec<String> {
		self.0.lock().iter().map(|event| event.message.clone()).collect()
	}
}
impl AuditSink for MemoryAuditSink {
	fn publish<'a>(&'a self, event: &'a AuditEvent) -> AuditFuture<'a> {
		Box::pin(async move {
			self.0.lock().push(event.clone());

			Ok(())
		})
	}
}
