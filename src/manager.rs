//! Token lifecycle policy: cache hits, skew-aware expiry, and single-flight refresh.
//!
//! [`TokenManager::valid_token`] reads the shared [`TokenStore`] slot and only calls the
//! [`TokenSource`] when the slot is empty or the cached token expires within the skew window.
//! Concurrent callers that miss the cache queue behind one refresh guard; whoever arrives
//! after the refresh completes re-reads the slot and receives the token the first caller
//! stored, so a cold start with many broadcaster tasks costs a single exchange.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{CachedToken, ClientCredential},
	clock::{Clock, SystemClock},
	oauth::TokenSource,
	store::TokenStore,
};

/// Owns expiry policy for the process-wide bearer token.
pub struct TokenManager {
	credential: ClientCredential,
	source: Arc<dyn TokenSource>,
	store: Arc<dyn TokenStore>,
	clock: Arc<dyn Clock>,
	skew: Duration,
	refresh_guard: AsyncMutex<()>,
	metrics: RefreshMetrics,
}
impl TokenManager {
	/// Safety margin applied when none is configured.
	pub const DEFAULT_SKEW: Duration = Duration::seconds(3);

	/// Creates a manager using the system clock and [`Self::DEFAULT_SKEW`].
	pub fn new(
		credential: ClientCredential,
		source: Arc<dyn TokenSource>,
		store: Arc<dyn TokenStore>,
	) -> Self {
		Self {
			credential,
			source,
			store,
			clock: Arc::new(SystemClock),
			skew: Self::DEFAULT_SKEW,
			refresh_guard: AsyncMutex::new(()),
			metrics: RefreshMetrics::default(),
		}
	}

	/// Replaces the time source.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Overrides the skew window; negative values clamp to zero.
	pub fn with_skew(mut self, skew: Duration) -> Self {
		self.skew = if skew.is_negative() { Duration::ZERO } else { skew };

		self
	}

	/// Client identifier attached to outbound requests.
	pub fn client_id(&self) -> &str {
		&self.credential.client_id
	}

	/// Skew window currently in force.
	pub fn skew(&self) -> Duration {
		self.skew
	}

	/// Cache and refresh counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Returns a token that is still valid beyond `now + skew`, refreshing when needed.
	///
	/// Authorization failures surface as [`Error::AuthorizationFailed`] and are never retried
	/// here.
	pub async fn valid_token(&self) -> Result<CachedToken> {
		if let Some(token) = self.cached() {
			self.metrics.record_cache_hit();

			return Ok(token);
		}

		let _singleflight = self.refresh_guard.lock().await;

		// Another caller may have refreshed while this one waited.
		if let Some(token) = self.cached() {
			self.metrics.record_cache_hit();

			return Ok(token);
		}

		self.refresh().await
	}

	fn cached(&self) -> Option<CachedToken> {
		let Some(token) = self.store.get() else {
			tracing::debug!("token store is empty");

			return None;
		};

		if token.is_expired_at(self.clock.now(), self.skew) {
			tracing::debug!(expires_at = %token.expires_at, "cached token expired");

			return None;
		}

		Some(token)
	}

	async fn refresh(&self) -> Result<CachedToken> {
		self.metrics.record_refresh();

		let access = self
			.source
			.authorize(&self.credential)
			.await
			.inspect_err(|_| self.metrics.record_failure())?;
		let token = CachedToken::issued(access, self.clock.now());

		self.store.set(token.clone());

		tracing::debug!(expires_at = %token.expires_at, "fetched new token");

		Ok(token)
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("client_id", &self.credential.client_id)
			.field("skew", &self.skew)
			.field("metrics", &self.metrics)
			.finish()
	}
}
