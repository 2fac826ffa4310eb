//! Token held in the process-wide slot, stamped with an absolute expiry.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenSecret},
};

/// Bearer credential paired with the instant it stops being usable.
///
/// Derived from an [`AccessToken`] at the moment it was received. Values are replaced
/// wholesale on refresh and never mutated in place.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedToken {
	/// Bearer credential; callers must avoid logging it.
	pub value: TokenSecret,
	/// Absolute expiry instant.
	pub expires_at: OffsetDateTime,
}
impl CachedToken {
	/// Creates a cached token expiring at `expires_at`.
	pub fn new(value: impl Into<String>, expires_at: OffsetDateTime) -> Self {
		Self { value: TokenSecret::new(value), expires_at }
	}

	/// Stamps an [`AccessToken`] received at `received_at`.
	pub fn issued(token: AccessToken, received_at: OffsetDateTime) -> Self {
		Self { value: token.token, expires_at: received_at + token.valid_for }
	}

	/// Returns `true` when the token must not be served at `now`.
	///
	/// The boundary is inclusive: a token whose expiry equals `now + skew` is expired. A
	/// skew that overflows the representable range treats every token as expired.
	pub fn is_expired_at(&self, now: OffsetDateTime, skew: Duration) -> bool {
		now.checked_add(skew).is_none_or(|edge| self.expires_at <= edge)
	}
}
impl Debug for CachedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedToken")
			.field("value", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
