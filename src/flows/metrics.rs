// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for token acquisition.
#[derive(Debug, Default)]
pub struct AcquisitionMetrics {
	acquisitions: AtomicU64,
	joins: AtomicU64,
	refresh_attempts: AtomicU64,
	refresh_fallbacks: AtomicU64,
	client_credentials_attempts: AtomicU64,
	failures: AtomicU64,
}
impl AcquisitionMetrics {
	/// Returns the number of acquisitions started.
	pub fn acquisitions(&self) -> u64 {
		self.acquisitions.load(Ordering::Relaxed)
	}

	/// Returns the number of callers that attached to an acquisition already in flight.
	pub fn joins(&self) -> u64 {
		self.joins.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh grants sent.
	pub fn refresh_attempts(&self) -> u64 {
		self.refresh_attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of failed refresh grants that fell back to client credentials.
	pub fn refresh_fallbacks(&self) -> u64 {
		self.refresh_fallbacks.load(Ordering::Relaxed)
	}

	/// Returns the number of client-credentials grants sent.
	pub fn client_credentials_attempts(&self) -> u64 {
		self.client_credentials_attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of acquisitions that ended in an error.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_acquisition(&self) {
		self.acquisitions.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_join(&self) {
		self.joins.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_attempt(&self) {
		self.refresh_attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_fallback(&self) {
		self.refresh_fallbacks.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_client_credentials_attempt(&self) {
		self.client_credentials_attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}
