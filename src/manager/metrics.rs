// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for token lookups.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	cache_hits: AtomicU64,
	refreshes: AtomicU64,
	failures: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the number of lookups served from the cached slot.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Returns the number of authorization exchanges attempted.
	pub fn refreshes(&self) -> u64 {
		self.refreshes.load(Ordering::Relaxed)
	}

	/// Returns the number of failed authorization exchanges.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh(&self) {
		self.refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}
